//! Error types for rfs
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::Status;

/// Result type alias using RfsError
pub type Result<T> = std::result::Result<T, RfsError>;

/// Unified error type for rfs operations
#[derive(Debug, Error)]
pub enum RfsError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown action: {0:?}")]
    UnknownAction(String),

    // -------------------------------------------------------------------------
    // Domain Errors (reported to the client as typed replies)
    // -------------------------------------------------------------------------
    #[error("Invalid remote path '{0}': {1}")]
    InvalidPath(String, &'static str),

    #[error("File '{}' not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Write lock busy for '{}'", .0.display())]
    LockBusy(PathBuf),

    // -------------------------------------------------------------------------
    // Version Index Errors
    // -------------------------------------------------------------------------
    #[error("Version index error: {0}")]
    Index(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    /// A non-OK reply received by the client
    #[error("{1}")]
    Remote(Status, String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RfsError {
    /// True for errors caused by the peer going away mid-exchange
    pub fn is_disconnect(&self) -> bool {
        match self {
            RfsError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
