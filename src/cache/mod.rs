//! Content-addressed artifact cache.
//!
//! Rendered diagrams and normalized images live on disk, one file per
//! [`CacheKey`]. Keys are digests of the normalized source, the output format
//! and the renderer's version tag, so identical sources share one artifact and
//! bumping a renderer's tag quietly invalidates everything it produced before.

mod store;

pub use store::CacheStore;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::render::RenderFormat;

/// Digest length in bytes (128 bits).
const DIGEST_LEN: usize = 16;

/// Errors raised by [`CacheStore`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Deterministic identity of a renderable source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    digest: [u8; DIGEST_LEN],
    format: RenderFormat,
}

impl CacheKey {
    /// Derive the key for `source` rendered to `format` by a renderer
    /// identified by `version_tag`.
    pub fn new(source: &str, format: RenderFormat, version_tag: &str) -> Self {
        let normalized = normalize_source(source);
        let mut hasher = Sha256::new();
        hasher.update(version_tag.as_bytes());
        hasher.update([0]);
        hasher.update(format.name().as_bytes());
        hasher.update([0]);
        hasher.update(normalized.as_bytes());
        let full = hasher.finalize();
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&full[..DIGEST_LEN]);
        Self { digest, format }
    }

    pub const fn format(&self) -> RenderFormat {
        self.format
    }

    /// Lowercase hex digest.
    pub fn hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// File name of the artifact inside the cache root.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.hex(), self.format.extension())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Line endings and surrounding whitespace do not change what a diagram
/// renders to.
pub fn normalize_source(source: &str) -> String {
    source.replace("\r\n", "\n").trim().to_string()
}

/// Handle to a published artifact, as carried by a ready block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    key: CacheKey,
    path: PathBuf,
}

impl ArtifactRef {
    pub const fn new(key: CacheKey, path: PathBuf) -> Self {
        Self { key, path }
    }

    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A published cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub created_at: SystemTime,
}

impl CacheEntry {
    pub fn artifact(&self) -> ArtifactRef {
        ArtifactRef::new(self.key, self.path.clone())
    }
}
