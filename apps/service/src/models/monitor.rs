use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::validation;

/// Identity and routing of one monitored domain. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    domain: String,
    url: String,
    notification_target: String,
}

impl MonitorConfig {
    /// Build a config from operator input, deriving the canonical domain key
    pub fn new(domain_url: &str, notification_target: &str) -> Result<Self> {
        let url = validation::parse_monitor_url(domain_url)?;
        validation::validate_webhook_target(notification_target)?;

        Ok(Self {
            domain: validation::domain_key(&url)?,
            url: url.to_string(),
            notification_target: notification_target.trim().to_string(),
        })
    }

    pub(crate) fn from_records(domain: &str, record: DomainRecord, webhook: WebhookRecord) -> Self {
        Self { domain: domain.to_string(), url: record.domain, notification_target: webhook.webhook_url }
    }

    /// Canonical key, without scheme
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// URL with scheme, used for probing
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn notification_target(&self) -> &str {
        &self.notification_target
    }

    pub(crate) fn domain_record(&self) -> DomainRecord {
        DomainRecord { domain: self.url.clone() }
    }

    pub(crate) fn webhook_record(&self) -> WebhookRecord {
        WebhookRecord { webhook_url: self.notification_target.clone() }
    }
}

/// `domain.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DomainRecord {
    pub domain: String,
}

/// `webhook.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WebhookRecord {
    pub webhook_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_domain_key() {
        let config = MonitorConfig::new("https://Example.com/status", "https://hooks.example.net/abc").unwrap();

        assert_eq!(config.domain(), "example.com");
        assert_eq!(config.url(), "https://example.com/status");
        assert_eq!(config.notification_target(), "https://hooks.example.net/abc");
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(MonitorConfig::new("ftp://example.com", "https://hooks.example.net/abc").is_err());
        assert!(MonitorConfig::new("https://example.com", "not-a-webhook").is_err());
    }
}
