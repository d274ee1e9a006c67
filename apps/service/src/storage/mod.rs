/// File-backed persistence under the monitors directory
///
/// Every monitored domain owns one directory holding its configuration
/// records, its append-only log and its worker registry record. All JSON
/// files are replaced atomically: written to a uniquely named sibling
/// temporary file, synced, then renamed over the target.
pub mod log;
pub mod monitors;

pub use log::{EntryLog, LogStore};
pub use monitors::MonitorStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::StorageError;

pub const DOMAIN_FILE: &str = "domain.json";
pub const WEBHOOK_FILE: &str = "webhook.json";
pub const LOG_FILE: &str = "log.json";
pub const WORKER_FILE: &str = "worker.json";
pub const WORKER_LOG_FILE: &str = "worker.log";

/// Replace `path` with the pretty JSON form of `value`
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|source| StorageError::Serialize { path: path.to_path_buf(), source })?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))?;

    // One temp file per writer; concurrent writers of the same record must
    // not rename each other's file away.
    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| StorageError::io(parent, err))?;
    tmp.write_all(&body).map_err(|err| StorageError::io(tmp.path(), err))?;
    tmp.as_file().sync_all().map_err(|err| StorageError::io(tmp.path(), err))?;

    tmp.persist(path).map_err(|err| StorageError::io(path, err.error))?;
    Ok(())
}

/// Read a JSON file; `None` when it does not exist
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::io(path, err)),
    };

    if raw.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::Corrupt { path: path.to_path_buf(), source })
}

/// Domain keys are single path components
pub(crate) fn is_valid_domain_key(domain: &str) -> bool {
    !domain.is_empty()
        && domain != "."
        && domain != ".."
        && !domain.contains(['/', '\\'])
        && !domain.contains('\0')
}
