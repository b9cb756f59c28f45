//! Version Index
//!
//! Persisted mapping from logical path to its latest version number.
//!
//! ## File Format
//! ```text
//! notes.txt=3
//! docs/report.pdf=1
//! ```
//!
//! The whole map is kept in memory behind one mutex. Every mutation writes a
//! complete copy to `<index>.tmp`, fsyncs it and renames it over the index,
//! so a reader of the file never sees a half-patched record.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, RfsError};

/// Shared version index
pub struct VersionIndex {
    /// Location of the index file
    path: PathBuf,

    /// path key → latest version (always ≥ 1)
    entries: Mutex<BTreeMap<String, u64>>,
}

impl VersionIndex {
    /// Open the index at `path`, creating an empty one if missing
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            parse_index(&fs::read_to_string(path)?)
        } else {
            persist(path, &BTreeMap::new())?;
            BTreeMap::new()
        };

        tracing::debug!("Version index {} loaded with {} entries", path.display(), entries.len());

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Latest recorded version for `key`, 0 if none
    pub fn latest_version(&self, key: &str) -> u64 {
        self.entries.lock().get(key).copied().unwrap_or(0)
    }

    /// Record `version` as the latest for `key`
    ///
    /// Versions must strictly increase; the in-memory map only changes once
    /// the new file is safely on disk.
    pub fn record_version(&self, key: &str, version: u64) -> Result<()> {
        let mut entries = self.entries.lock();

        let current = entries.get(key).copied().unwrap_or(0);
        if version <= current {
            return Err(RfsError::Index(format!(
                "version {} for '{}' does not advance past {}",
                version, key, current
            )));
        }

        let mut updated = entries.clone();
        updated.insert(key.to_string(), version);
        persist(&self.path, &updated)?;
        *entries = updated;

        Ok(())
    }

    /// Drop the record for `key`
    ///
    /// Returns whether a record existed.
    pub fn remove_entry(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(false);
        }

        let mut updated = entries.clone();
        updated.remove(key);
        persist(&self.path, &updated)?;
        *entries = updated;

        Ok(true)
    }

    /// Snapshot of all records, sorted by path
    pub fn entries(&self) -> Vec<(String, u64)> {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Number of paths with at least one versioned write
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Location of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse index text; malformed lines are skipped
///
/// The version follows the last `=`, so keys may themselves contain `=`.
fn parse_index(text: &str) -> BTreeMap<String, u64> {
    let mut entries = BTreeMap::new();

    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let parsed = line
            .rsplit_once('=')
            .and_then(|(key, v)| Some((key, v.trim().parse::<u64>().ok()?)));

        match parsed {
            Some((key, version)) if !key.is_empty() && version > 0 => {
                let slot = entries.entry(key.to_string()).or_insert(version);
                *slot = (*slot).max(version);
            }
            _ => tracing::warn!("Skipping malformed version index line {}: {:?}", lineno + 1, line),
        }
    }

    entries
}

/// Write the full map to a temp file and atomically swap it in
fn persist(path: &Path, entries: &BTreeMap<String, u64>) -> Result<()> {
    let tmp_path = path.with_extension("tmp");

    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for (key, version) in entries {
            writeln!(writer, "{}={}", key, version)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
