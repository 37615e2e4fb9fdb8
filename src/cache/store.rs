use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::{CacheEntry, CacheError, CacheKey};
use crate::render::RenderFormat;

/// Bytes read from an entry to decide whether it is intact.
const HEADER_PROBE_LEN: usize = 512;

/// Temporaries younger than this may belong to a `put` still in progress.
const STALE_TEMP_AGE: Duration = Duration::from_secs(10 * 60);

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Artifact files keyed by [`CacheKey`] under one directory.
///
/// Writes land in a temporary sibling and are renamed into place, so a
/// reader sees either no file or a complete one. Nothing is evicted
/// automatically; [`CacheStore::clear`] is the only way entries go away.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open (and create if needed) a cache rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| CacheError::io(&root, err))?;
        Ok(Self { root })
    }

    /// Per-user cache directory for artifacts.
    pub fn default_root() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(local) = std::env::var_os("LOCALAPPDATA") {
                return PathBuf::from(local).join("flint").join("artifacts");
            }
        }

        #[cfg(target_os = "macos")]
        {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home)
                    .join("Library")
                    .join("Caches")
                    .join("flint")
                    .join("artifacts");
            }
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME") {
                return PathBuf::from(xdg).join("flint").join("artifacts");
            }
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home)
                    .join(".cache")
                    .join("flint")
                    .join("artifacts");
            }
        }

        PathBuf::from(".flint-cache")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Look up an artifact. Absent, unreadable and corrupt entries are all
    /// misses; corrupt ones are removed so the next render replaces them.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable cache entry treated as miss");
                return None;
            }
        };

        let mut header = Vec::with_capacity(HEADER_PROBE_LEN);
        let read = (&mut file)
            .take(HEADER_PROBE_LEN as u64)
            .read_to_end(&mut header);
        if let Err(err) = read {
            warn!(path = %path.display(), %err, "unreadable cache entry treated as miss");
            return None;
        }
        if !key.format().matches_header(&header) {
            warn!(path = %path.display(), "corrupt cache entry treated as miss");
            if let Err(err) = fs::remove_file(&path) {
                debug!(path = %path.display(), %err, "could not remove corrupt entry");
            }
            return None;
        }

        let created_at = file
            .metadata()
            .and_then(|meta| meta.created().or_else(|_| meta.modified()))
            .unwrap_or(UNIX_EPOCH);
        debug!(key = %key, "cache hit");
        Some(CacheEntry {
            key: *key,
            path,
            created_at,
        })
    }

    /// Read an entry's bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file disappeared or cannot be read.
    pub fn read(&self, entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
        fs::read(&entry.path).map_err(|err| CacheError::io(&entry.path, err))
    }

    /// Publish `bytes` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
        let path = self.path_for(key);
        let temp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            key.hex(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written = write_synced(&temp, bytes).and_then(|()| fs::rename(&temp, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&temp);
            return Err(CacheError::io(&path, err));
        }

        debug!(key = %key, bytes = bytes.len(), "cache entry published");
        Ok(CacheEntry {
            key: *key,
            path,
            created_at: SystemTime::now(),
        })
    }

    /// Remove every artifact and any abandoned temporary file. Returns how
    /// many artifacts were removed. Recent temporaries and unrelated files
    /// are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a file cannot
    /// be removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(CacheError::io(&self.root, err)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|err| CacheError::io(&self.root, err))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let artifact = is_artifact_name(&name);
            if !artifact && !(is_temp_name(&name) && is_stale(&entry)) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    if artifact {
                        removed += 1;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(CacheError::io(&path, err)),
            }
        }
        debug!(removed, root = %self.root.display(), "cache cleared");
        Ok(removed)
    }

    /// Number of artifacts currently on disk.
    pub fn len(&self) -> usize {
        fs::read_dir(&self.root).map_or(0, |entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| is_artifact_name(&e.file_name().to_string_lossy()))
                .count()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn is_artifact_name(name: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    stem.len() == 32
        && stem.bytes().all(|b| b.is_ascii_hexdigit())
        && RenderFormat::from_extension(ext).is_some()
}

fn is_stale(entry: &fs::DirEntry) -> bool {
    entry
        .metadata()
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= STALE_TEMP_AGE)
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}
