use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::checker::Prober;
use super::lookup::Lookup;
use super::state::{Decision, DetectionPolicy, NotificationState};
use super::types::{Fields, LogEntry, Observation, ProbeResult, RegistrationSnapshot, SiteStatus};
use crate::config;
use crate::models::MonitorConfig;
use crate::notify::{Notification, Notifier};
use crate::storage::EntryLog;

/// Loop parameters of one engine
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub interval: Duration,
    pub policy: DetectionPolicy,
    pub history_entries: usize,
}

impl From<&config::Monitoring> for EngineSettings {
    fn from(monitoring: &config::Monitoring) -> Self {
        Self {
            interval: Duration::from_secs(monitoring.interval_seconds),
            policy: DetectionPolicy {
                latency_ceiling_ms: monitoring.latency_ceiling_ms,
                latency_bucket_ms: monitoring.latency_bucket_ms,
            },
            history_entries: monitoring.history_entries,
        }
    }
}

/// External services an engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub prober: Arc<dyn Prober>,
    pub registration: Arc<dyn Lookup>,
    pub network: Option<Arc<dyn Lookup>>,
    pub notifier: Arc<dyn Notifier>,
}

/// What happened in one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub status: SiteStatus,
    pub probe: ProbeResult,
    pub decision: Decision,
    pub notified: bool,
    pub persisted: bool,
}

/// Polling loop for exactly one domain
pub struct MonitoringEngine {
    monitor: MonitorConfig,
    settings: EngineSettings,
    collaborators: Collaborators,
    log_store: Arc<dyn EntryLog>,
    /// Summary lines of the most recent log entries, oldest first
    history: VecDeque<String>,
}

impl MonitoringEngine {
    /// Create an engine, seeding notification history from the stored log
    pub fn new(
        monitor: MonitorConfig,
        settings: EngineSettings,
        collaborators: Collaborators,
        log_store: Arc<dyn EntryLog>,
    ) -> Self {
        let history = match log_store.load_history(monitor.domain()) {
            Ok(entries) => {
                let skip = entries.len().saturating_sub(settings.history_entries);
                entries.iter().skip(skip).map(LogEntry::summary_line).collect()
            }
            Err(e) => {
                warn!("Could not load history for {}, starting empty: {}", monitor.domain(), e);
                VecDeque::new()
            }
        };

        Self { monitor, settings, collaborators, log_store, history }
    }

    /// Run cycles until `shutdown` changes or its sender is dropped.
    ///
    /// A cycle always runs to completion; shutdown is only observed while
    /// sleeping between cycles.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Monitoring {} ({}) every {}s",
            self.monitor.domain(),
            self.monitor.url(),
            self.settings.interval.as_secs()
        );

        let mut state = NotificationState::default();
        loop {
            let (report, next) = self.run_cycle(state).await;
            state = next;

            info!(
                "Domain: {}, Status: {}, Ping Status: {}, Ping Time: {} ms, Reasons: {:?}, Notified: {}, Logged: {}",
                self.monitor.domain(),
                report.status,
                report.probe.outcome(),
                report.probe.elapsed_ms,
                report.decision.reasons,
                report.notified,
                report.persisted
            );

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Stopped monitoring {}", self.monitor.domain());
    }

    /// One probe -> lookup -> detect -> notify -> log pass
    pub async fn run_cycle(&mut self, state: NotificationState) -> (CycleReport, NotificationState) {
        let observation = self.observe().await;
        let (decision, next) = state.advance(&observation, &self.settings.policy);

        let status = observation.status;
        let probe = observation.probe;
        let entry = LogEntry::from_observation(observation, decision.diff.clone());
        self.remember(entry.summary_line());

        let mut notified = false;
        if decision.should_notify() {
            debug!("Notifying for {}: {:?}", self.monitor.domain(), decision.reasons);
            let notification = self.render(&entry);
            match self
                .collaborators
                .notifier
                .notify(self.monitor.notification_target(), &notification)
                .await
            {
                Ok(()) => notified = true,
                Err(e) => warn!("Failed to dispatch notification for {}: {}", self.monitor.domain(), e),
            }
        }

        let persisted = self.persist(entry);

        (CycleReport { status, probe, decision, notified, persisted }, next)
    }

    /// Gather one observation. Collaborator errors become degraded values.
    pub async fn observe(&self) -> Observation {
        let domain = self.monitor.domain();
        let timestamp = Utc::now();

        let probe = match self.collaborators.prober.probe(self.monitor.url()).await {
            Ok(probe) => probe,
            Err(e) => {
                warn!("Error checking {}: {}", domain, e);
                ProbeResult::failed()
            }
        };
        let status = probe.status(self.settings.policy.latency_ceiling_ms);

        let registration = match self.collaborators.registration.lookup(domain).await {
            Ok(fields) => RegistrationSnapshot::Fields(fields),
            Err(e) => {
                warn!("Registration lookup for {} failed: {}", domain, e);
                RegistrationSnapshot::Unavailable(e.to_string())
            }
        };

        let network = match &self.collaborators.network {
            Some(lookup) => match lookup.lookup(domain).await {
                Ok(fields) => Some(fields),
                Err(e) => {
                    debug!("Network details for {} unavailable: {}", domain, e);
                    None
                }
            },
            None => None,
        };

        Observation { timestamp, probe, status, registration, network }
    }

    fn remember(&mut self, line: String) {
        self.history.push_back(line);
        while self.history.len() > self.settings.history_entries {
            self.history.pop_front();
        }
    }

    fn render(&self, entry: &LogEntry) -> Notification {
        let details = match &entry.registration {
            RegistrationSnapshot::Fields(fields) => fields.clone(),
            RegistrationSnapshot::Unavailable(error) => {
                Fields::from([("error".to_string(), error.clone())])
            }
        };

        Notification {
            title: format!(
                "{} IS {}",
                self.monitor.domain().to_uppercase(),
                entry.status.to_string().to_uppercase()
            ),
            timestamp: entry.timestamp,
            status: entry.status,
            probe: entry.probe,
            details,
            network: entry.network.clone(),
            diff: entry.changes.clone(),
            history: self.history.iter().cloned().collect(),
        }
    }

    /// Append to the log, retrying once. Never fails the cycle.
    fn persist(&self, entry: LogEntry) -> bool {
        let domain = self.monitor.domain();
        match self.log_store.append(domain, entry.clone()) {
            Ok(_) => true,
            Err(first) => {
                warn!("Failed to persist log entry for {}, retrying: {}", domain, first);
                match self.log_store.append(domain, entry) {
                    Ok(_) => true,
                    Err(e) => {
                        error!("Log entry for {} was not persisted: {}", domain, e);
                        false
                    }
                }
            }
        }
    }
}
