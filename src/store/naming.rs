//! Logical paths and versioned file names
//!
//! Version 0 lives at the logical path itself; version N>0 inserts `_N`
//! before the last extension of the final component:
//!
//! ```text
//! notes.txt      v0 → notes.txt
//! notes.txt      v3 → notes_3.txt
//! docs/a.tar.gz  v2 → docs/a.tar_2.gz
//! Makefile       v1 → Makefile_1
//! .bashrc        v1 → .bashrc_1
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, RfsError};

/// Name of the shared version index file
pub const INDEX_FILENAME: &str = ".file_VERSION";

/// Name of the directory-scoped lock marker
pub const DIR_LOCK_FILENAME: &str = ".file_LOCK";

/// Prefix shared by all other server-internal files (path locks, partial uploads)
pub const INTERNAL_PREFIX: &str = ".rfs-";

/// A validated, client-visible path relative to the storage root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    rel: PathBuf,
    key: String,
}

impl LogicalPath {
    /// Validate a remote path sent by a client
    ///
    /// Rejects empty, absolute and `..` paths, control characters that would
    /// break the index format, and names reserved for server bookkeeping.
    /// `.` components are dropped so `./a.txt` and `a.txt` are the same file.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |why| RfsError::InvalidPath(raw.to_string(), why);

        if raw.contains(['\n', '\r', '\0']) {
            return Err(invalid("contains a control character"));
        }

        let mut rel = PathBuf::new();
        let mut parts = Vec::new();
        for component in Path::new(raw).components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| invalid("not valid UTF-8"))?;
                    if is_reserved_name(part) {
                        return Err(invalid("name is reserved by the server"));
                    }
                    rel.push(part);
                    parts.push(part);
                }
                Component::CurDir => {}
                Component::ParentDir => return Err(invalid("must not contain '..'")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("must be relative"))
                }
            }
        }

        if parts.is_empty() {
            return Err(invalid("is empty"));
        }

        Ok(Self {
            key: parts.join("/"),
            rel,
        })
    }

    /// Relative path of version 0
    pub fn as_path(&self) -> &Path {
        &self.rel
    }

    /// Stable key used in the version index
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Final component
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Directory containing the file, relative to the root ("" for top level)
    pub fn parent(&self) -> &Path {
        self.rel.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Relative physical path for `version`
    pub fn versioned(&self, version: u64) -> PathBuf {
        versioned_name(&self.rel, version)
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Physical name of `version` of `path`
pub fn versioned_name(path: &Path, version: u64) -> PathBuf {
    if version == 0 {
        return path.to_path_buf();
    }

    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return path.to_path_buf(),
    };

    let renamed = match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}.{}", &name[..dot], version, &name[dot + 1..]),
        _ => format!("{}_{}", name, version),
    };

    path.with_file_name(renamed)
}

/// True for file names the server uses for its own bookkeeping
pub fn is_reserved_name(name: &str) -> bool {
    name == INDEX_FILENAME
        || name.starts_with(&format!("{}.", INDEX_FILENAME))
        || name == DIR_LOCK_FILENAME
        || name.starts_with(INTERNAL_PREFIX)
}
