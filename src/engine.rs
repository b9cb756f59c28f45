//! Engine Module
//!
//! The shared state every connection handler works against.
//!
//! ## Responsibilities
//! - Own the version index, lock manager and file store for one data directory
//! - Implement WRITE / GET / RM / LS semantics independent of the transport
//! - Clean up stale lock markers and partial uploads on startup

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::VersionSelector;
use crate::store::{
    discard, FileStore, ListReport, LockManager, LogicalPath, OpenedFile, RemoveReport, StoredFile,
    VersionIndex, INDEX_FILENAME,
};

/// The storage engine
///
/// ## Concurrency Model
///
/// - **Writes** (WRITE/RM): take the lock for the path's scope first. Busy
///   locks fail fast with [`LockBusy`](crate::RfsError::LockBusy); nothing waits.
/// - **Index**: every mutation goes through the index's own mutex and is
///   persisted by copy-and-rename.
/// - **Reads** (GET/LS): lock-free. Versions are renamed into place only
///   once complete, so a reader sees either the whole file or nothing.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Persisted path → latest version mapping
    index: VersionIndex,

    /// Write locks
    locks: LockManager,

    /// Physical file I/O
    store: FileStore,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Load (or create) the version index
    /// 3. Sweep stale lock markers and partial uploads
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let index = VersionIndex::open(&config.data_dir.join(INDEX_FILENAME))?;
        let locks = LockManager::new(&config.data_dir, config.lock_scope);
        let store = FileStore::new(&config.data_dir);

        let stale_locks = locks.sweep_stale()?;
        let partials = store.sweep_partials();
        if stale_locks > 0 || partials > 0 {
            tracing::info!(
                "Startup cleanup: {} stale lock(s), {} partial upload(s) removed",
                stale_locks,
                partials
            );
        }

        tracing::info!(
            "Engine opened at {} ({} versioned path(s), {:?} locking)",
            config.data_dir.display(),
            index.len(),
            locks.scope()
        );

        Ok(Self {
            config,
            index,
            locks,
            store,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Store `len` bytes from `src` as the next version of `path`
    ///
    /// The first write of a path with no copy at all becomes the unversioned
    /// version 0 and leaves the index untouched; every later write becomes
    /// `latest + 1` and is recorded. A version name already taken on disk
    /// (say a client stored `a_1.txt` as its own file) is skipped rather than
    /// overwritten. If recording fails the new file is removed again, so the
    /// index never points past what exists.
    pub fn write<R: Read + ?Sized>(
        &self,
        path: &LogicalPath,
        src: &mut R,
        len: u64,
    ) -> Result<StoredFile> {
        let _guard = self.locks.acquire(path)?;

        let latest = self.index.latest_version(path.key());
        let mut version = if latest == 0 && !self.store.exists(path, 0) {
            0
        } else {
            latest + 1
        };
        while version > 0 && self.store.physical_path(path, version).exists() {
            tracing::warn!(
                "'{}' already exists on disk, skipping v{} of {}",
                path.versioned(version).display(),
                version,
                path
            );
            version += 1;
        }

        let stored = self.store.store(path, version, src, len)?;

        if version > 0 {
            if let Err(e) = self.index.record_version(path.key(), version) {
                discard(&self.store.physical_path(path, version));
                return Err(e);
            }
        }

        tracing::info!(
            "Stored {} as '{}' (v{}, {} bytes)",
            path,
            stored.name.display(),
            version,
            stored.size
        );
        Ok(stored)
    }

    /// Convenience wrapper around [`Engine::write`] for in-memory content
    pub fn write_bytes(&self, path: &LogicalPath, data: &[u8]) -> Result<StoredFile> {
        let mut src = data;
        self.write(path, &mut src, data.len() as u64)
    }

    // =========================================================================
    // GET
    // =========================================================================

    /// Resolve a selector to a concrete version number
    pub fn resolve(&self, path: &LogicalPath, selector: VersionSelector) -> u64 {
        match selector {
            VersionSelector::Latest => self.index.latest_version(path.key()),
            VersionSelector::Exact(version) => version,
        }
    }

    /// Open the selected version for streaming
    pub fn open_version(&self, path: &LogicalPath, selector: VersionSelector) -> Result<OpenedFile> {
        let version = self.resolve(path, selector);
        self.store.open(path, version)
    }

    /// Read the selected version fully into memory
    pub fn read_version(&self, path: &LogicalPath, selector: VersionSelector) -> Result<Vec<u8>> {
        let version = self.resolve(path, selector);
        self.store.load(path, version)
    }

    // =========================================================================
    // RM / LS
    // =========================================================================

    /// Delete every version of `path` and clear its index entry
    ///
    /// Holds the path's write lock, so it cannot interleave with a WRITE.
    pub fn remove(&self, path: &LogicalPath) -> Result<RemoveReport> {
        let _guard = self.locks.acquire(path)?;

        let latest = self.index.latest_version(path.key());
        let entries = self.store.remove_all(path, latest);

        if latest > 0 {
            self.index.remove_entry(path.key())?;
        }

        let report = RemoveReport { entries };
        tracing::info!("Removed {} (versions 0..={}, any removed: {})", path, latest, report.any_removed());
        Ok(report)
    }

    /// Describe every version of `path`
    pub fn list(&self, path: &LogicalPath) -> ListReport {
        let latest = self.index.latest_version(path.key());
        ListReport {
            path: path.to_string(),
            entries: self.store.list(path, latest),
        }
    }

    /// Latest recorded version of `path` (0 if unversioned or unknown)
    pub fn latest_version(&self, path: &LogicalPath) -> u64 {
        self.index.latest_version(path.key())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Absolute physical path of one version
    pub fn physical_path(&self, path: &LogicalPath, version: u64) -> PathBuf {
        self.store.physical_path(path, version)
    }

    pub fn index(&self) -> &VersionIndex {
        &self.index
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
