//! Write Lock Manager
//!
//! Advisory mutual exclusion for writers. A lock is a marker file created
//! with create-new semantics beside the data, mirrored in an in-process set
//! so the check and the create happen under one mutex.
//!
//! Markers:
//! - [`LockScope::Path`]: `<dir>/.rfs-lock.<file>`
//! - [`LockScope::Directory`]: `<dir>/.file_LOCK`
//!
//! A [`LockGuard`] deletes its marker on drop, so every exit path of a
//! handler releases the lock.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::config::LockScope;
use crate::error::{Result, RfsError};

use super::naming::{LogicalPath, DIR_LOCK_FILENAME};

/// Prefix of per-path lock markers
pub const PATH_LOCK_PREFIX: &str = ".rfs-lock.";

/// Hands out write locks under one storage root
pub struct LockManager {
    /// Storage root the markers live under
    root: PathBuf,

    /// Lock granularity
    scope: LockScope,

    /// Relative marker paths currently held by this process
    held: Mutex<HashSet<PathBuf>>,
}

/// A held lock; released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    marker: PathBuf,
}

impl LockManager {
    pub fn new(root: &Path, scope: LockScope) -> Self {
        Self {
            root: root.to_path_buf(),
            scope,
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Try to take the write lock covering `path`
    ///
    /// Never blocks: a held lock yields [`RfsError::LockBusy`]. Missing
    /// parent directories of the target are created.
    pub fn acquire(&self, path: &LogicalPath) -> Result<LockGuard<'_>> {
        let marker = self.marker_for(path);
        let abs = self.root.join(&marker);

        let mut held = self.held.lock();
        if held.contains(&marker) {
            return Err(RfsError::LockBusy(path.as_path().to_path_buf()));
        }

        if let Some(dir) = abs.parent() {
            fs::create_dir_all(dir)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&abs) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Held by another process sharing this root
                return Err(RfsError::LockBusy(path.as_path().to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        held.insert(marker.clone());
        tracing::trace!("Acquired lock {}", marker.display());

        Ok(LockGuard {
            manager: self,
            marker,
        })
    }

    /// Whether the lock covering `path` is currently held
    pub fn is_locked(&self, path: &LogicalPath) -> bool {
        let marker = self.marker_for(path);
        self.held.lock().contains(&marker) || self.root.join(&marker).exists()
    }

    /// Remove lock markers left behind by a previous process
    ///
    /// Only safe before this manager has handed out any lock.
    pub fn sweep_stale(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !is_marker(entry.file_name().to_str()) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    tracing::warn!("Removed stale lock marker {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => tracing::warn!(
                    "Cannot remove stale lock marker {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }

        Ok(removed)
    }

    pub fn scope(&self) -> LockScope {
        self.scope
    }

    /// Relative marker path for `path` under the configured scope
    fn marker_for(&self, path: &LogicalPath) -> PathBuf {
        match self.scope {
            LockScope::Path => path
                .parent()
                .join(format!("{}{}", PATH_LOCK_PREFIX, path.file_name())),
            LockScope::Directory => path.parent().join(DIR_LOCK_FILENAME),
        }
    }

    fn release(&self, marker: &Path) {
        let abs = self.root.join(marker);
        if let Err(e) = fs::remove_file(&abs) {
            // The write already happened; the in-process lock still frees up
            tracing::error!("Error removing the lock {}: {}", abs.display(), e);
        }
        self.held.lock().remove(marker);
        tracing::trace!("Released lock {}", marker.display());
    }
}

impl LockGuard<'_> {
    /// Relative path of the marker file
    pub fn marker(&self) -> &Path {
        &self.marker
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.marker);
    }
}

fn is_marker(name: Option<&str>) -> bool {
    match name {
        Some(name) => name == DIR_LOCK_FILENAME || name.starts_with(PATH_LOCK_PREFIX),
        None => false,
    }
}
