use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::StorageError;
use crate::storage::{WORKER_FILE, read_json, write_json_atomic};

/// Supervisor-side record of a launched worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHandle {
    pub domain: String,
    pub pid: u32,
    /// Exact argument vector the worker was launched with, program excluded
    pub args: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl WorkerHandle {
    pub fn new(domain: impl Into<String>, pid: u32, args: Vec<String>) -> Self {
        Self { domain: domain.into(), pid, args, started_at: Utc::now(), stopped_at: None }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }
}

/// Explicit domain -> worker registry, one `worker.json` per monitor
/// directory. Survives supervisor restarts.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    root: PathBuf,
}

impl WorkerRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, domain: &str) -> PathBuf {
        self.root.join(domain).join(WORKER_FILE)
    }

    pub fn load(&self, domain: &str) -> Result<Option<WorkerHandle>, StorageError> {
        read_json(&self.path(domain))
    }

    pub fn record(&self, handle: &WorkerHandle) -> Result<(), StorageError> {
        write_json_atomic(&self.path(&handle.domain), handle)
    }

    /// Mark the worker with `pid` as stopped. Records of other workers are
    /// left alone.
    pub fn mark_stopped(&self, domain: &str, pid: u32) -> Result<(), StorageError> {
        match self.load(domain)? {
            Some(mut handle) if handle.pid == pid && !handle.is_stopped() => {
                handle.stopped_at = Some(Utc::now());
                self.record(&handle)
            }
            _ => Ok(()),
        }
    }
}
