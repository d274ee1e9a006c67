use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use super::{Notification, Notifier};
use crate::monitoring::diff;
use crate::monitoring::types::SiteStatus;

const COLOR_ONLINE: u32 = 0x00ff00;
const COLOR_OFFLINE: u32 = 0xff0000;
/// Discord rejects embed field values above this many characters
const FIELD_LIMIT: usize = 1024;

/// Sends notifications as a single embed to a Discord-compatible webhook
pub struct DiscordNotifier {
    client: reqwest::Client,
    username: String,
    footer: String,
}

impl DiscordNotifier {
    pub fn new(username: impl Into<String>, footer: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), username: username.into(), footer: footer.into() }
    }

    fn payload(&self, notification: &Notification) -> Value {
        let (icon, color) = match notification.status {
            SiteStatus::Online => (":green_circle:", COLOR_ONLINE),
            SiteStatus::Offline => (":red_circle:", COLOR_OFFLINE),
        };

        let network = notification
            .network
            .as_ref()
            .map(|fields| code_block("", &diff::render(fields).join("\n")))
            .unwrap_or_else(|| "Unavailable".to_string());

        let changes = if notification.diff.is_empty() {
            "No changes detected".to_string()
        } else {
            format!("Detected changes\n{}", code_block("diff", &notification.diff.join("\n")))
        };

        let history = if notification.history.is_empty() {
            "No history yet".to_string()
        } else {
            code_block("", &notification.history.join("\n"))
        };

        json!({
            "username": self.username,
            "embeds": [{
                "title": format!("{icon} {}", notification.title),
                "color": color,
                "timestamp": notification.timestamp.to_rfc3339(),
                "fields": [
                    field("Time", code_block("", &notification.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()), true),
                    field("Status", notification.status.to_string(), true),
                    field("Ping Status", notification.probe.outcome().to_string(), true),
                    field("Response Time", code_block("", &format!("{} ms", notification.probe.elapsed_ms)), true),
                    field("Whois Info", code_block("", &diff::render(&notification.details).join("\n")), false),
                    field("IP Details", network, false),
                    field("Changes", changes, false),
                    field("History", history, false),
                ],
                "footer": { "text": self.footer },
            }],
        })
    }
}

fn field(name: &str, value: String, inline: bool) -> Value {
    json!({ "name": name, "value": truncate(value), "inline": inline })
}

fn code_block(language: &str, body: &str) -> String {
    format!("```{language}\n{body}\n```")
}

fn truncate(value: String) -> String {
    if value.chars().count() <= FIELD_LIMIT {
        return value;
    }
    let closes_block = value.ends_with("```");
    let suffix = if closes_block { "\n…\n```" } else { "…" };
    let keep = FIELD_LIMIT - suffix.chars().count();
    let mut cut: String = value.chars().take(keep).collect();
    cut.push_str(suffix);
    cut
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, target: &str, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(target)
            .json(&self.payload(notification))
            .send()
            .await
            .map_err(|e| anyhow!("Webhook request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Webhook rejected notification with status {}: {}", status, body));
        }

        Ok(())
    }
}
