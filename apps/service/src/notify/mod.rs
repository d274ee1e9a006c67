/// Notification dispatch for monitoring events
///
/// The engine hands a fully rendered `Notification` to a `Notifier`; delivery
/// failures are reported back but never stop the monitoring loop.
pub mod discord;

pub use discord::DiscordNotifier;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::monitoring::types::{Fields, ProbeResult, SiteStatus};

/// Event handed to a notifier for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub status: SiteStatus,
    pub probe: ProbeResult,
    /// Registration fields, or a single `error` field when the lookup failed
    pub details: Fields,
    pub network: Option<Fields>,
    pub diff: Vec<String>,
    pub history: Vec<String>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &str, notification: &Notification) -> Result<()>;
}
