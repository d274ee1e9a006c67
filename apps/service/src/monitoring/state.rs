//! Notification dedup state and the decide-notify step.

use super::diff;
use super::types::{Fields, Observation, ProbeOutcome, SiteStatus};

/// Parameters of the decide-notify step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionPolicy {
    pub latency_ceiling_ms: u64,
    /// Latencies are compared in buckets of this size; 0 or 1 compares exactly
    pub latency_bucket_ms: u64,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self { latency_ceiling_ms: 1000, latency_bucket_ms: 250 }
    }
}

/// Dedup key of the probe side of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusTuple {
    pub status: SiteStatus,
    pub outcome: ProbeOutcome,
    /// Bucketed latency, or -1 when the probe failed
    pub latency: i64,
}

impl StatusTuple {
    pub fn from_observation(observation: &Observation, policy: &DetectionPolicy) -> Self {
        let latency = if observation.probe.success {
            bucket(observation.probe.elapsed_ms, policy.latency_bucket_ms)
        } else {
            -1
        };

        Self { status: observation.status, outcome: observation.probe.outcome(), latency }
    }
}

fn bucket(elapsed_ms: i64, bucket_ms: u64) -> i64 {
    match i64::try_from(bucket_ms) {
        Ok(size) if size > 1 => elapsed_ms.div_euclid(size) * size,
        _ => elapsed_ms,
    }
}

/// Why a cycle produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyReason {
    FirstCycle,
    StatusChanged,
    RegistrationChanged,
}

/// Outcome of the decide-notify step for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub reasons: Vec<NotifyReason>,
    pub diff: Vec<String>,
}

impl Decision {
    pub fn should_notify(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Last-known dedup state of one engine. Lives only as long as the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    last_status: Option<StatusTuple>,
    last_snapshot: Option<Fields>,
}

impl NotificationState {
    #[cfg(test)]
    pub fn last_status(&self) -> Option<&StatusTuple> {
        self.last_status.as_ref()
    }

    #[cfg(test)]
    pub fn last_snapshot(&self) -> Option<&Fields> {
        self.last_snapshot.as_ref()
    }

    /// Decide whether `observation` warrants a notification and produce the
    /// state for the next cycle.
    ///
    /// A failed lookup yields no diff and leaves the previous structured
    /// snapshot in place as the comparison baseline.
    pub fn advance(
        self,
        observation: &Observation,
        policy: &DetectionPolicy,
    ) -> (Decision, NotificationState) {
        let tuple = StatusTuple::from_observation(observation, policy);
        let current = observation.registration.fields();

        let changes = match (&self.last_snapshot, current) {
            (Some(previous), Some(current)) => diff::diff(previous, current),
            _ => Vec::new(),
        };

        let mut reasons = Vec::new();
        match self.last_status {
            None => reasons.push(NotifyReason::FirstCycle),
            Some(previous) if previous != tuple => reasons.push(NotifyReason::StatusChanged),
            Some(_) => {}
        }
        if !changes.is_empty() {
            reasons.push(NotifyReason::RegistrationChanged);
        }

        let next = NotificationState {
            last_status: Some(tuple),
            last_snapshot: current.cloned().or(self.last_snapshot),
        };

        (Decision { reasons, diff: changes }, next)
    }
}
