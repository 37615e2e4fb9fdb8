//! Live reload of the document being viewed.
//!
//! The watcher follows whichever file the session is showing: navigating to
//! another document moves the watch to that file's directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

/// Debounced change notifications for one file at a time.
pub struct DocumentWatcher {
    watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    target: Option<Target>,
    debounce: Duration,
    pending_since: Option<Instant>,
}

struct Target {
    root: PathBuf,
    path: PathBuf,
    name: Option<OsString>,
}

impl Target {
    fn new(path: &Path) -> Self {
        // Event paths from the OS are canonical.
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self {
            root: watch_root_for(&path),
            name: path.file_name().map(std::ffi::OsStr::to_os_string),
            path,
        }
    }

    fn matches(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.root
                || path == &self.path
                || self
                    .name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

impl DocumentWatcher {
    /// Create a watcher with nothing to watch yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new(debounce: Duration) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        Ok(Self {
            watcher,
            rx,
            target: None,
            debounce,
            pending_since: None,
        })
    }

    /// Watch `path` instead of the current target.
    ///
    /// # Errors
    ///
    /// Returns an error if the new directory cannot be watched.
    pub fn follow(&mut self, path: &Path) -> notify::Result<()> {
        let next = Target::new(path);
        if self.target.as_ref().is_some_and(|t| t.path == next.path) {
            return Ok(());
        }
        let same_root = self.target.as_ref().is_some_and(|t| t.root == next.root);
        if !same_root {
            if let Some(previous) = &self.target
                && let Err(err) = self.watcher.unwatch(&previous.root)
            {
                debug!(root = %previous.root.display(), %err, "unwatch failed");
            }
            self.watcher.watch(&next.root, RecursiveMode::NonRecursive)?;
        }
        debug!(path = %next.path.display(), "watching document");
        self.target = Some(next);
        self.pending_since = None;
        // Drop events that belong to the previous file.
        while self.rx.try_recv().is_ok() {}
        Ok(())
    }

    pub fn target_path(&self) -> Option<&Path> {
        self.target.as_ref().map(|t| t.path.as_path())
    }

    /// Returns true once a change has been quiet for the debounce period.
    pub fn take_change_ready(&mut self) -> bool {
        let mut saw_relevant = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) => saw_relevant |= self.is_relevant(&ev),
                Err(err) => warn!(%err, "file watcher error"),
            }
        }
        if saw_relevant {
            self.pending_since = Some(Instant::now());
        }

        let Some(pending_since) = self.pending_since else {
            return false;
        };
        if pending_since.elapsed() >= self.debounce {
            self.pending_since = None;
            return true;
        }
        false
    }

    fn is_relevant(&self, event: &Event) -> bool {
        self.target.as_ref().is_some_and(|t| t.matches(event))
    }
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
