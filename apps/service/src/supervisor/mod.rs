/// Supervisor module - lifecycle of per-domain monitoring workers
///
/// The supervisor creates monitor configurations and starts, lists and stops
/// one worker process per domain. Which worker belongs to which domain is
/// kept in an explicit registry record next to the monitor's configuration,
/// never inferred from process command lines.
pub mod process;
pub mod registry;


pub use process::{ProcessLauncher, Termination, WorkerLauncher};
pub use registry::{WorkerHandle, WorkerRegistry};

use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{StorageError, SupervisorError};
use crate::models::MonitorConfig;
use crate::storage::{LogStore, MonitorStore};

/// Lifecycle state of a monitor as seen by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Configured, never started
    Configured,
    Running,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Configured => write!(f, "configured"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-domain outcomes of a start-all / stop-all
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<(String, Result<T, SupervisorError>)>,
}

impl<T> BatchReport<T> {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| outcome.is_err()).count()
    }
}

pub struct Supervisor {
    monitors: MonitorStore,
    logs: LogStore,
    registry: WorkerRegistry,
    launcher: Box<dyn WorkerLauncher>,
}

impl Supervisor {
    pub fn new(root: impl Into<PathBuf>, launcher: Box<dyn WorkerLauncher>) -> Self {
        let root = root.into();
        Self {
            monitors: MonitorStore::new(&root),
            logs: LogStore::new(&root),
            registry: WorkerRegistry::new(&root),
            launcher,
        }
    }

    /// Create the configuration and empty log of a new monitor, optionally
    /// starting its worker right away.
    ///
    /// When the immediate start fails the monitor stays created and the start
    /// error is returned.
    pub fn create_monitor(
        &self,
        domain_url: &str,
        notification_target: &str,
        start: bool,
    ) -> Result<MonitorConfig, SupervisorError> {
        let config = MonitorConfig::new(domain_url, notification_target)
            .map_err(|e| SupervisorError::Config(e.to_string()))?;

        self.monitors.create(&config).map_err(|err| match err {
            StorageError::AlreadyExists(domain) => {
                SupervisorError::Config(format!("a monitor for {domain} already exists"))
            }
            other => SupervisorError::Storage(other),
        })?;
        self.logs.initialize(config.domain())?;
        info!("Created new monitor for {}", config.url());

        if start {
            self.start_monitor(config.domain())?;
        }

        Ok(config)
    }

    /// Domain keys of every configured monitor, sorted
    pub fn list_monitors(&self) -> Result<Vec<String>, SupervisorError> {
        Ok(self.monitors.list()?)
    }

    pub fn monitor_states(&self) -> Result<Vec<(String, WorkerState)>, SupervisorError> {
        self.list_monitors()?
            .into_iter()
            .map(|domain| {
                let state = self.worker_state(&domain)?;
                Ok((domain, state))
            })
            .collect()
    }

    pub fn worker_state(&self, domain: &str) -> Result<WorkerState, SupervisorError> {
        Ok(match self.registry.load(domain)? {
            None => WorkerState::Configured,
            Some(handle) if !handle.is_stopped() && self.launcher.is_alive(&handle) => {
                WorkerState::Running
            }
            Some(_) => WorkerState::Stopped,
        })
    }

    pub fn start_monitor(&self, domain: &str) -> Result<WorkerHandle, SupervisorError> {
        let config = self.monitors.load(domain).map_err(missing_as_not_found)?;
        let monitor_dir = self.monitors.monitor_dir(domain)?;

        if let Some(handle) = self.registry.load(domain)? {
            if !handle.is_stopped() && self.launcher.is_alive(&handle) {
                return Err(SupervisorError::AlreadyRunning(domain.to_string()));
            }
        }

        let handle = self
            .launcher
            .launch(&config, &monitor_dir)
            .map_err(|source| SupervisorError::Launch { domain: domain.to_string(), source })?;
        self.registry.record(&handle)?;

        info!("Started monitor for {} (pid {})", domain, handle.pid);
        Ok(handle)
    }

    pub fn stop_monitor(&self, domain: &str) -> Result<Termination, SupervisorError> {
        if !self.monitors.exists(domain) {
            return Err(SupervisorError::NotFound(format!("No monitor configured for {domain}")));
        }

        let not_running = || SupervisorError::NotFound(format!("No running monitor found for {domain}"));
        let handle = match self.registry.load(domain)? {
            Some(handle) if !handle.is_stopped() => handle,
            _ => return Err(not_running()),
        };

        if !self.launcher.is_alive(&handle) {
            self.registry.mark_stopped(domain, handle.pid)?;
            return Err(not_running());
        }

        let termination = self
            .launcher
            .terminate(&handle)
            .map_err(|source| SupervisorError::Terminate { domain: domain.to_string(), source })?;
        // The worker is gone either way; the exiting worker records its own stop too
        if let Err(e) = self.registry.mark_stopped(domain, handle.pid) {
            warn!("Failed to record stop of {} (pid {}): {}", domain, handle.pid, e);
        }

        match termination {
            Termination::Signalled => info!("Stopped monitor for {} (pid {})", domain, handle.pid),
            Termination::AlreadyExited => {
                info!("Monitor for {} had already exited (pid {})", domain, handle.pid)
            }
        }
        Ok(termination)
    }

    pub fn start_all(&self) -> Result<BatchReport<WorkerHandle>, SupervisorError> {
        self.for_each_monitor(|domain| self.start_monitor(domain))
    }

    pub fn stop_all(&self) -> Result<BatchReport<Termination>, SupervisorError> {
        self.for_each_monitor(|domain| self.stop_monitor(domain))
    }

    fn for_each_monitor<T>(
        &self,
        operation: impl Fn(&str) -> Result<T, SupervisorError>,
    ) -> Result<BatchReport<T>, SupervisorError> {
        let outcomes = self
            .list_monitors()?
            .into_iter()
            .map(|domain| {
                let outcome = operation(&domain);
                if let Err(e) = &outcome {
                    warn!("{}: {}", domain, e);
                }
                (domain, outcome)
            })
            .collect();

        Ok(BatchReport { outcomes })
    }
}

fn missing_as_not_found(err: StorageError) -> SupervisorError {
    match err {
        StorageError::MissingMonitor(domain) => {
            SupervisorError::NotFound(format!("No monitor configured for {domain}"))
        }
        other => SupervisorError::Storage(other),
    }
}
