//! Storage Module
//!
//! Everything that touches the server's local filesystem.
//!
//! ## Layout under the data directory
//! ```text
//! {data_dir}/
//!   ├── .file_VERSION            version index (path=version lines)
//!   ├── notes.txt                notes.txt v0
//!   ├── notes_1.txt              notes.txt v1
//!   ├── .rfs-lock.notes.txt      write lock (path scope, transient)
//!   └── docs/
//!       ├── .file_LOCK           write lock (directory scope, transient)
//!       └── report.pdf
//! ```

mod file_store;
mod index;
mod lock;
mod naming;

pub use file_store::{
    FileStore, ListReport, ListedVersion, OpenedFile, RemoveOutcome, RemoveReport,
    RemovedVersion, StoredFile, VersionState, PARTIAL_PREFIX,
};
pub(crate) use file_store::discard;
pub use index::VersionIndex;
pub use lock::{LockGuard, LockManager, PATH_LOCK_PREFIX};
pub use naming::{
    is_reserved_name, versioned_name, LogicalPath, DIR_LOCK_FILENAME, INDEX_FILENAME,
    INTERNAL_PREFIX,
};
