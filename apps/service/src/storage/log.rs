use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{LOG_FILE, read_json, write_json_atomic};
use crate::error::StorageError;
use crate::monitoring::types::LogEntry;

/// On-disk shape of `log.json`
#[derive(Debug, Default, Serialize, Deserialize)]
struct LogDocument {
    #[serde(default)]
    logs: Vec<LogEntry>,
}

/// History operations a monitoring engine needs
pub trait EntryLog: Send + Sync {
    fn load_history(&self, domain: &str) -> Result<Vec<LogEntry>, StorageError>;

    fn append(&self, domain: &str, entry: LogEntry) -> Result<LogEntry, StorageError>;
}

/// Append-only, per-domain history of polling cycles.
///
/// Each domain has exactly one writer (its worker), so appends are a plain
/// read-modify-write of the whole document followed by an atomic replace.
#[derive(Debug, Clone)]
pub struct LogStore {
    root: PathBuf,
}

impl LogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, domain: &str) -> PathBuf {
        self.root.join(domain).join(LOG_FILE)
    }

    /// Create an empty log for a new monitor, keeping any existing one
    pub fn initialize(&self, domain: &str) -> Result<(), StorageError> {
        let path = self.path(domain);
        if path.exists() {
            return Ok(());
        }
        write_json_atomic(&path, &LogDocument::default())
    }

    /// Full history in append order. A missing log is an empty history.
    pub fn load_history(&self, domain: &str) -> Result<Vec<LogEntry>, StorageError> {
        Ok(Self::read(&self.path(domain))?.logs)
    }

    /// Append `entry` after every existing entry and persist.
    ///
    /// Timestamps stay strictly increasing: an entry not later than the
    /// current tail is moved to one millisecond after it. Returns the entry
    /// as stored.
    pub fn append(&self, domain: &str, mut entry: LogEntry) -> Result<LogEntry, StorageError> {
        let path = self.path(domain);
        let mut document = Self::read(&path)?;

        if let Some(last) = document.logs.last() {
            if entry.timestamp <= last.timestamp {
                let adjusted = last.timestamp + Duration::milliseconds(1);
                warn!(
                    "Log entry for {} at {} is not after {}, storing it at {}",
                    domain, entry.timestamp, last.timestamp, adjusted
                );
                entry.timestamp = adjusted;
            }
        }

        document.logs.push(entry.clone());
        write_json_atomic(&path, &document)?;
        Ok(entry)
    }

    fn read(path: &Path) -> Result<LogDocument, StorageError> {
        Ok(read_json::<LogDocument>(path)?.unwrap_or_default())
    }
}

impl EntryLog for LogStore {
    fn load_history(&self, domain: &str) -> Result<Vec<LogEntry>, StorageError> {
        LogStore::load_history(self, domain)
    }

    fn append(&self, domain: &str, entry: LogEntry) -> Result<LogEntry, StorageError> {
        LogStore::append(self, domain, entry)
    }
}
