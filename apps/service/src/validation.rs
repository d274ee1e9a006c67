//! Input validation for monitor targets, webhook targets and settings.

use anyhow::{Result, anyhow};
use std::ops::RangeInclusive;
use url::Url;

/// Parse an operator-supplied domain URL, defaulting to https when no
/// scheme is given.
pub fn parse_monitor_url(input: &str) -> Result<Url> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("Domain cannot be empty"));
    }

    let candidate =
        if input.contains("://") { input.to_string() } else { format!("https://{input}") };
    let url = Url::parse(&candidate).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme '{}'. Must be http or https", other)),
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(anyhow!("URL must have a valid host"));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(url)
}

/// Canonical key for a monitor: lowercase host, plus port when it is not the
/// scheme default.
pub fn domain_key(url: &Url) -> Result<String> {
    let host = url.host_str().ok_or_else(|| anyhow!("URL must have a valid host"))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Notification targets are webhook URLs
pub fn validate_webhook_target(target: &str) -> Result<()> {
    let url = Url::parse(target.trim()).map_err(|e| anyhow!("Invalid webhook URL: {}", e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!("Invalid scheme for webhook: {}", other)),
    }
}

fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

/// Seconds between two cycles of one worker
const INTERVAL_SECONDS: RangeInclusive<u64> = 10..=86_400;
/// Bound on a single probe or lookup
const TIMEOUT_SECONDS: RangeInclusive<u64> = 1..=300;

fn within(setting: &str, value: u64, range: RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(anyhow!(
        "{} is {} seconds, expected {} to {}",
        setting,
        value,
        range.start(),
        range.end()
    ))
}

pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    within("monitoring.interval_seconds", interval_seconds, INTERVAL_SECONDS)
}

/// `setting` names the config key in the error
pub fn validate_timeout(setting: &str, timeout_seconds: u64) -> Result<()> {
    within(setting, timeout_seconds, TIMEOUT_SECONDS)
}

pub fn validate_latency_ceiling(ceiling_ms: u64) -> Result<()> {
    if ceiling_ms == 0 {
        return Err(anyhow!("monitoring.latency_ceiling_ms must be greater than 0"));
    }
    Ok(())
}
