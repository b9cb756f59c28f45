//! Configuration for rfs
//!
//! Centralized configuration with sensible defaults, plus the small
//! key=value `.config` file shared by the server and the client CLI.
//!
//! ## `.config` format
//! ```text
//! IP_ADDRESS=127.0.0.1
//! PORT=1500
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, RfsError};

/// Port used when the config file does not name one
pub const DEFAULT_PORT: u16 = 1500;

/// Key holding the server address in the config file
pub const ADDRESS_KEY: &str = "IP_ADDRESS";

/// Key holding the server port in the config file
pub const PORT_KEY: &str = "PORT";

/// Main configuration for an rfs server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all managed files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── .file_VERSION      (version index)
    ///     ├── notes.txt          (version 0)
    ///     └── notes_1.txt        (version 1)
    pub data_dir: PathBuf,

    /// Granularity of the write lock
    pub lock_scope: LockScope,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// How long the acceptor waits for in-flight workers after shutdown (milliseconds)
    pub shutdown_grace_ms: u64,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Which writes exclude each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// One writer per logical path
    Path,

    /// One writer per directory, whatever file it targets
    Directory,
}

impl FromStr for LockScope {
    type Err = RfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "path" | "file" => Ok(LockScope::Path),
            "dir" | "directory" => Ok(LockScope::Directory),
            other => Err(RfsError::Config(format!("unknown lock scope '{}'", other))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./rfs_data"),
            lock_scope: LockScope::Path,
            listen_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            shutdown_grace_ms: 5000,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all managed files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the write lock granularity
    pub fn lock_scope(mut self, scope: LockScope) -> Self {
        self.config.lock_scope = scope;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the shutdown grace period (in milliseconds)
    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_grace_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// key=value config file
// =============================================================================

/// Parsed contents of a key=value config file
///
/// Lines without `=` are ignored. Keys and values are trimmed, so a trailing
/// newline or stray spaces never end up inside an address.
#[derive(Debug, Clone, Default)]
pub struct KvFile {
    entries: HashMap<String, String>,
}

impl KvFile {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            RfsError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&text))
    }

    /// Parse config text
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self { entries }
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Resolve `IP_ADDRESS` and `PORT` into a `host:port` string
    pub fn server_addr(&self) -> Result<String> {
        let host = self
            .get(ADDRESS_KEY)
            .ok_or_else(|| RfsError::Config(format!("missing {} entry", ADDRESS_KEY)))?;
        let port = match self.get(PORT_KEY) {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| RfsError::Config(format!("invalid {} '{}'", PORT_KEY, p)))?,
            None => DEFAULT_PORT,
        };
        Ok(format!("{}:{}", host, port))
    }
}

/// Client-side settings: where the server lives
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub server_addr: String,
}

impl ClientConfig {
    /// Load the server address from a key=value config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let kv = KvFile::load(path)?;
        Ok(Self {
            server_addr: kv.server_addr()?,
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
        }
    }
}
