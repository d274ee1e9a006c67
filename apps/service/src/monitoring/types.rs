use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name -> value mapping returned by a lookup
pub type Fields = BTreeMap<String, String>;

/// Reported state of a monitored site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Online,
    Offline,
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteStatus::Online => write!(f, "Online"),
            SiteStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// Whether the reachability probe got any answer at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    Successful,
    Failed,
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Successful => write!(f, "Successful"),
            ProbeOutcome::Failed => write!(f, "Failed"),
        }
    }
}

/// Result of a single reachability probe. A failed probe carries
/// `elapsed_ms == -1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub elapsed_ms: i64,
}

impl ProbeResult {
    pub fn succeeded(elapsed_ms: u64) -> Self {
        Self { success: true, elapsed_ms: i64::try_from(elapsed_ms).unwrap_or(i64::MAX) }
    }

    pub fn failed() -> Self {
        Self { success: false, elapsed_ms: -1 }
    }

    pub fn outcome(&self) -> ProbeOutcome {
        if self.success { ProbeOutcome::Successful } else { ProbeOutcome::Failed }
    }

    /// Online only when the probe answered strictly below the latency ceiling.
    /// Slow answers are reported as offline, same as no answer.
    pub fn status(&self, latency_ceiling_ms: u64) -> SiteStatus {
        let ceiling = i64::try_from(latency_ceiling_ms).unwrap_or(i64::MAX);
        if self.success && self.elapsed_ms >= 0 && self.elapsed_ms < ceiling {
            SiteStatus::Online
        } else {
            SiteStatus::Offline
        }
    }
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.success { write!(f, "{} ms", self.elapsed_ms) } else { write!(f, "Failed") }
    }
}

/// Registration data captured in one cycle. A failed lookup keeps the error
/// text instead of a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationSnapshot {
    Fields(Fields),
    Unavailable(String),
}

impl RegistrationSnapshot {
    pub fn fields(&self) -> Option<&Fields> {
        match self {
            RegistrationSnapshot::Fields(fields) => Some(fields),
            RegistrationSnapshot::Unavailable(_) => None,
        }
    }
}

/// One polling-cycle result, before it is folded into a log entry
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub probe: ProbeResult,
    pub status: SiteStatus,
    pub registration: RegistrationSnapshot,
    pub network: Option<Fields>,
}

/// Persisted record of one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub status: SiteStatus,
    pub probe: ProbeResult,
    pub registration: RegistrationSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Fields>,
    #[serde(default)]
    pub changes: Vec<String>,
}

impl LogEntry {
    pub fn from_observation(observation: Observation, changes: Vec<String>) -> Self {
        Self {
            timestamp: observation.timestamp,
            status: observation.status,
            probe: observation.probe,
            registration: observation.registration,
            network: observation.network,
            changes,
        }
    }

    /// One-line form used as notification history
    pub fn summary_line(&self) -> String {
        format!("{} - {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_latency_ceiling_downgrades_status() {
        assert_eq!(ProbeResult::succeeded(120).status(1000), SiteStatus::Online);
        assert_eq!(ProbeResult::succeeded(999).status(1000), SiteStatus::Online);
        assert_eq!(ProbeResult::succeeded(1000).status(1000), SiteStatus::Offline);
        assert_eq!(ProbeResult::succeeded(4500).status(1000), SiteStatus::Offline);
        assert_eq!(ProbeResult::failed().status(1000), SiteStatus::Offline);
    }

    #[test]
    fn test_failed_probe_marker() {
        let probe = ProbeResult::failed();
        assert!(!probe.success);
        assert_eq!(probe.elapsed_ms, -1);
        assert_eq!(probe.outcome(), ProbeOutcome::Failed);
    }

    #[test]
    fn test_summary_line() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let mut entry = LogEntry {
            timestamp,
            status: SiteStatus::Online,
            probe: ProbeResult::succeeded(87),
            registration: RegistrationSnapshot::Unavailable("timeout".into()),
            network: None,
            changes: Vec::new(),
        };
        assert_eq!(entry.summary_line(), "2024-03-01 12:30:05 - 87 ms");

        entry.probe = ProbeResult::failed();
        assert_eq!(entry.summary_line(), "2024-03-01 12:30:05 - Failed");
    }

    #[test]
    fn test_log_entry_serialized_form() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let entry = LogEntry {
            timestamp,
            status: SiteStatus::Offline,
            probe: ProbeResult::failed(),
            registration: RegistrationSnapshot::Unavailable("connection refused".into()),
            network: None,
            changes: Vec::new(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["probe"]["elapsed_ms"], -1);
        assert_eq!(json["registration"]["unavailable"], "connection refused");
        assert!(json.get("network").is_none());
    }
}
