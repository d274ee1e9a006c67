use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::types::Fields;

/// Metadata fetch for a domain, returning a flat field mapping
#[async_trait::async_trait]
pub trait Lookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<Fields>;
}

const WHOIS_PORT: u16 = 43;
const MAX_REFERRALS: usize = 2;
const NETWORK_FIELDS: &str = "status,isp,org,as,asname,reverse,mobile,proxy,hosting,query";

/// WHOIS client speaking the plain TCP protocol, following referrals from
/// the root server to the registry and then the registrar.
pub struct WhoisLookup {
    root_server: String,
    port: u16,
    timeout_duration: Duration,
    excluded_fields: HashSet<String>,
}

impl WhoisLookup {
    pub fn new(root_server: impl Into<String>, timeout_seconds: u64, excluded_fields: &[String]) -> Self {
        Self {
            root_server: root_server.into(),
            port: WHOIS_PORT,
            timeout_duration: Duration::from_secs(timeout_seconds),
            excluded_fields: excluded_fields.iter().map(|field| normalize_key(field)).collect(),
        }
    }

    /// Talk to WHOIS servers on a non-standard port
    #[cfg(test)]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn query(&self, server: &str, domain: &str) -> Result<String> {
        let connect = TcpStream::connect((server, self.port));
        let mut stream = timeout(self.timeout_duration, connect)
            .await
            .map_err(|_| anyhow!("WHOIS connection to {} timed out", server))?
            .map_err(|e| anyhow!("WHOIS connection to {} failed: {}", server, e))?;

        stream.write_all(format!("{domain}\r\n").as_bytes()).await?;

        let mut raw = Vec::new();
        timeout(self.timeout_duration, stream.read_to_end(&mut raw))
            .await
            .map_err(|_| anyhow!("WHOIS response from {} timed out", server))?
            .map_err(|e| anyhow!("WHOIS response from {} failed: {}", server, e))?;

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

#[async_trait::async_trait]
impl Lookup for WhoisLookup {
    async fn lookup(&self, domain: &str) -> Result<Fields> {
        let query = registrable_name(domain);
        let mut server = self.root_server.clone();
        let mut raw = self.query(&server, &query).await?;

        for hop in 0..MAX_REFERRALS {
            let Some(next) = referral(&raw) else { break };
            if next.eq_ignore_ascii_case(&server) {
                break;
            }

            debug!("Following WHOIS referral for {} to {}", query, next);
            match self.query(&next, &query).await {
                Ok(response) => {
                    raw = response;
                    server = next;
                }
                // The registry answer is still usable when the registrar hop fails
                Err(e) if hop > 0 => {
                    warn!("WHOIS referral to {} failed, keeping registry data: {}", next, e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let fields = parse_fields(&raw, &self.excluded_fields);
        if fields.is_empty() {
            return Err(anyhow!("No registration data for {} from {}", query, server));
        }
        Ok(fields)
    }
}

/// Host part of a domain key, without port or a leading `www.`
fn registrable_name(domain: &str) -> String {
    let host = domain.split(':').next().unwrap_or(domain);
    host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase()
}

fn referral(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        match key.trim().to_ascii_lowercase().as_str() {
            "refer" | "whois" | "registrar whois server" => {
                let value = value.trim();
                let value = value.strip_prefix("whois://").unwrap_or(value).trim_end_matches('/');
                (!value.is_empty()).then(|| value.to_ascii_lowercase())
            }
            _ => None,
        }
    })
}

/// `Registry Expiry Date` -> `registry_expiry_date`
fn normalize_key(key: &str) -> String {
    let mut normalized = String::with_capacity(key.len());
    for c in key.trim().chars() {
        if c.is_ascii_alphanumeric() {
            normalized.push(c.to_ascii_lowercase());
        } else if !normalized.ends_with('_') {
            normalized.push('_');
        }
    }
    normalized.trim_matches('_').to_string()
}

/// Parse `Key: Value` lines. Repeated keys merge into one sorted,
/// de-duplicated, comma-joined value.
fn parse_fields(raw: &str, excluded: &HashSet<String>) -> Fields {
    let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        // Prose paragraphs (terms of use, notices) are not fields
        if value.is_empty() || key.split_whitespace().count() > 5 {
            continue;
        }

        let key = normalize_key(key);
        if key.is_empty() || excluded.contains(&key) {
            continue;
        }

        merged.entry(key).or_default().insert(value.to_string());
    }

    merged
        .into_iter()
        .map(|(key, values)| (key, values.into_iter().collect::<Vec<_>>().join(", ")))
        .collect()
}

/// IP and network ownership details for a host from an ip-api style endpoint
pub struct NetworkLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl NetworkLookup {
    pub fn new(endpoint: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self { client, endpoint: endpoint.into() })
    }
}

#[async_trait::async_trait]
impl Lookup for NetworkLookup {
    async fn lookup(&self, domain: &str) -> Result<Fields> {
        let host = domain.split(':').next().unwrap_or(domain);
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), host);

        let body: serde_json::Map<String, serde_json::Value> = self
            .client
            .get(&url)
            .query(&[("fields", NETWORK_FIELDS)])
            .send()
            .await
            .map_err(|e| anyhow!("Network details request failed: {}", e))?
            .error_for_status()?
            .json()
            .await?;

        if body.get("status").and_then(|s| s.as_str()) == Some("fail") {
            return Err(anyhow!("Network details unavailable for {}", host));
        }

        Ok(body
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect())
    }
}
