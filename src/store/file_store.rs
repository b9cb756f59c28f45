//! File Store
//!
//! Raw I/O for versioned physical files under the storage root.
//!
//! ## Responsibilities
//! - Stream uploads into a hidden partial file, then rename into place
//! - Never overwrite an existing version
//! - Open versions for streaming downloads
//! - Bulk removal and listing across `0..=latest`

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use walkdir::WalkDir;

use crate::error::{Result, RfsError};
use crate::protocol::copy_exact;

use super::naming::LogicalPath;

/// Prefix of in-flight upload files
pub const PARTIAL_PREFIX: &str = ".rfs-tmp.";

/// ctime(3)-style timestamp used in listings
const MODIFIED_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(1);

/// Physical storage for all versions under one root
pub struct FileStore {
    root: PathBuf,
}

/// Result of a successful store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Physical name relative to the root
    pub name: PathBuf,

    /// Version written
    pub version: u64,

    /// Bytes written
    pub size: u64,
}

/// An opened version ready to stream
#[derive(Debug)]
pub struct OpenedFile {
    pub file: File,
    pub name: PathBuf,
    pub version: u64,
    pub size: u64,
}

/// What happened to one version during removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    Missing,
    Failed(String),
}

/// One line of a removal report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedVersion {
    pub name: PathBuf,
    pub version: u64,
    pub outcome: RemoveOutcome,
}

/// State of one version in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionState {
    Present { modified: SystemTime, size: u64 },
    Missing,
    Unreadable(String),
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedVersion {
    pub name: PathBuf,
    pub version: u64,
    pub state: VersionState,
}

impl FileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Absolute path of `version` of `path`
    pub fn physical_path(&self, path: &LogicalPath, version: u64) -> PathBuf {
        self.root.join(path.versioned(version))
    }

    /// Whether `version` of `path` exists on disk
    pub fn exists(&self, path: &LogicalPath, version: u64) -> bool {
        self.physical_path(path, version).is_file()
    }

    /// Create `version` of `path` from exactly `len` bytes of `src`
    ///
    /// Content lands in a hidden partial file first and is renamed into place
    /// once complete, so readers never observe a half-written version. Fails
    /// with `AlreadyExists` rather than replacing an existing version. The
    /// caller must hold the write lock covering `path`.
    pub fn store<R: Read + ?Sized>(
        &self,
        path: &LogicalPath,
        version: u64,
        src: &mut R,
        len: u64,
    ) -> Result<StoredFile> {
        let name = path.versioned(version);
        let target = self.root.join(&name);
        let dir = target.parent().unwrap_or(self.root.as_path()).to_path_buf();
        fs::create_dir_all(&dir)?;

        if target.exists() {
            return Err(already_exists(&name));
        }

        let partial = dir.join(format!(
            "{}{}.{}",
            PARTIAL_PREFIX,
            path.file_name(),
            PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = write_partial(&partial, src, len) {
            discard(&partial);
            return Err(e);
        }

        if target.exists() {
            discard(&partial);
            return Err(already_exists(&name));
        }
        if let Err(e) = fs::rename(&partial, &target) {
            discard(&partial);
            return Err(e.into());
        }

        Ok(StoredFile {
            name,
            version,
            size: len,
        })
    }

    /// Convenience wrapper around [`FileStore::store`] for in-memory content
    pub fn store_bytes(&self, path: &LogicalPath, version: u64, data: &[u8]) -> Result<StoredFile> {
        let mut src = data;
        self.store(path, version, &mut src, data.len() as u64)
    }

    /// Open `version` of `path` for reading
    pub fn open(&self, path: &LogicalPath, version: u64) -> Result<OpenedFile> {
        let name = path.versioned(version);
        let file = match File::open(self.root.join(&name)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(RfsError::NotFound(name)),
            Err(e) => return Err(e.into()),
        };

        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(RfsError::NotFound(name));
        }

        Ok(OpenedFile {
            file,
            name,
            version,
            size: meta.len(),
        })
    }

    /// Read `version` of `path` fully into memory
    pub fn load(&self, path: &LogicalPath, version: u64) -> Result<Vec<u8>> {
        let mut opened = self.open(path, version)?;
        let mut data = Vec::with_capacity(opened.size as usize);
        opened.file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Delete every existing version in `0..=latest`
    pub fn remove_all(&self, path: &LogicalPath, latest: u64) -> Vec<RemovedVersion> {
        (0..=latest)
            .map(|version| {
                let name = path.versioned(version);
                let outcome = match fs::remove_file(self.root.join(&name)) {
                    Ok(()) => RemoveOutcome::Removed,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => RemoveOutcome::Missing,
                    Err(e) => {
                        tracing::warn!("Error removing file '{}': {}", name.display(), e);
                        RemoveOutcome::Failed(e.to_string())
                    }
                };
                RemovedVersion {
                    name,
                    version,
                    outcome,
                }
            })
            .collect()
    }

    /// Describe every version in `0..=latest`
    pub fn list(&self, path: &LogicalPath, latest: u64) -> Vec<ListedVersion> {
        (0..=latest)
            .map(|version| {
                let name = path.versioned(version);
                let state = match fs::metadata(self.root.join(&name)) {
                    Ok(meta) if meta.is_file() => match meta.modified() {
                        Ok(modified) => VersionState::Present {
                            modified,
                            size: meta.len(),
                        },
                        Err(e) => VersionState::Unreadable(e.to_string()),
                    },
                    Ok(_) => VersionState::Missing,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => VersionState::Missing,
                    Err(e) => VersionState::Unreadable(e.to_string()),
                };
                ListedVersion {
                    name,
                    version,
                    state,
                }
            })
            .collect()
    }

    /// Delete partial uploads left behind by a previous process
    pub fn sweep_partials(&self) -> usize {
        let mut removed = 0;
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            let is_partial = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(PARTIAL_PREFIX));
            if entry.file_type().is_file() && is_partial && fs::remove_file(entry.path()).is_ok() {
                tracing::warn!("Removed stale partial upload {}", entry.path().display());
                removed += 1;
            }
        }
        removed
    }
}

fn write_partial<R: Read + ?Sized>(partial: &Path, src: &mut R, len: u64) -> Result<()> {
    let file = OpenOptions::new().write(true).create_new(true).open(partial)?;
    let mut writer = BufWriter::new(file);
    copy_exact(src, &mut writer, len)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Best-effort removal of a file that must not survive a failed operation
pub(crate) fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Error removing file '{}': {}", path.display(), e),
    }
}

fn already_exists(name: &Path) -> RfsError {
    RfsError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("version file '{}' already exists", name.display()),
    ))
}

// =============================================================================
// Reports
// =============================================================================

/// Per-version outcome of an RM
#[derive(Debug, Clone)]
pub struct RemoveReport {
    pub entries: Vec<RemovedVersion>,
}

impl RemoveReport {
    /// Whether at least one physical file was deleted
    pub fn any_removed(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.outcome == RemoveOutcome::Removed)
    }
}

impl fmt::Display for RemoveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let name = entry.name.display();
            match &entry.outcome {
                RemoveOutcome::Removed => write!(f, "File '{}' is removed successfully", name)?,
                RemoveOutcome::Missing => write!(f, "File '{}' not exist", name)?,
                RemoveOutcome::Failed(_) => write!(f, "Error removing file '{}'", name)?,
            }
        }
        Ok(())
    }
}

/// Per-version description produced by LS
#[derive(Debug, Clone)]
pub struct ListReport {
    pub path: String,
    pub entries: Vec<ListedVersion>,
}

impl ListReport {
    /// Number of versions that exist on disk
    pub fn present(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, VersionState::Present { .. }))
            .count()
    }
}

impl fmt::Display for ListReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Versioning Information about {}:", self.path)?;
        for entry in &self.entries {
            f.write_str("\n\n")?;
            let name = entry.name.display();
            match &entry.state {
                VersionState::Present { modified, .. } => {
                    let modified: DateTime<Local> = (*modified).into();
                    write!(
                        f,
                        "File: {}\nVersion: v{}\nLast modified: {}",
                        name,
                        entry.version,
                        modified.format(MODIFIED_FORMAT)
                    )?;
                }
                VersionState::Missing => write!(f, "File '{}' not exist", name)?,
                VersionState::Unreadable(_) => {
                    write!(f, "Error getting information about file '{}'", name)?
                }
            }
        }
        Ok(())
    }
}
