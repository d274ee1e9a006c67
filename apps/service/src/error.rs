use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the per-domain files under the monitors directory
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("{path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Monitor for {0} already exists")]
    AlreadyExists(String),

    #[error("No monitor configured for {0}")]
    MissingMonitor(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: IoError) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Operator-visible failures of supervisor commands
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Monitor for {0} is already running")]
    AlreadyRunning(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to launch worker for {domain}: {source}")]
    Launch {
        domain: String,
        #[source]
        source: IoError,
    },

    #[error("Failed to stop worker for {domain}: {source}")]
    Terminate {
        domain: String,
        #[source]
        source: IoError,
    },
}
