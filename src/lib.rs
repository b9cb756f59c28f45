//! # rfs
//!
//! A remote file store over TCP where every write becomes a new numbered
//! version of the logical file:
//! - Length-prefixed framing shared by client and server
//! - One action per connection, one thread per connection
//! - Persisted version index with copy-and-rename updates
//! - Scoped write locks released on every exit path
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │          (non-blocking acceptor, thread per client)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Connection (dispatcher)                      │
//! │            WRITE / GET / RM / LS / EXIT handlers             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! └──────┬──────────────────────┬─────────────────────┬─────────┘
//!        │                      │                     │
//!        ▼                      ▼                     ▼
//! ┌─────────────┐      ┌─────────────────┐    ┌─────────────┐
//! │VersionIndex │      │   LockManager   │    │  FileStore  │
//! │  (Mutex)    │      │ (marker files)  │    │ (versions)  │
//! └─────────────┘      └─────────────────┘    └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod engine;
pub mod network;
pub mod protocol;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{ClientConfig, Config, LockScope};
pub use engine::Engine;
pub use error::{Result, RfsError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rfs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
