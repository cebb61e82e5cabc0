use crate::error::{AlertDispatchError, Result};
use crate::NotificationChannel;
use async_trait::async_trait;
use certwatch_common::types::{Alert, Severity};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_CHANNEL: &str = "#general";
pub const DEFAULT_USERNAME: &str = "SSL Check";

const MAX_ERROR_BODY: usize = 500;

/// Posts alerts to a Slack incoming webhook as a single-field attachment.
pub struct SlackWebhookChannel {
    client: reqwest::Client,
    webhook_url: String,
    channel: String,
    username: String,
}

impl SlackWebhookChannel {
    pub fn new(webhook_url: &str, channel: &str, username: &str) -> Result<Self> {
        if webhook_url.trim().is_empty() {
            return Err(AlertDispatchError::InvalidConfig(
                "webhook_url is empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
            channel: or_default(channel, DEFAULT_CHANNEL),
            username: or_default(username, DEFAULT_USERNAME),
        })
    }

    fn color(severity: Severity) -> &'static str {
        match severity {
            Severity::Info => "good",
            Severity::Warning => "warning",
            Severity::Critical => "danger",
        }
    }

    /// Builds the webhook body for `alert`.
    pub fn render_payload(&self, alert: &Alert) -> Value {
        serde_json::json!({
            "channel": self.channel,
            "username": self.username,
            "attachments": [{
                "fallback": alert.fallback,
                "color": Self::color(alert.severity),
                "fields": [{
                    "title": alert.title,
                    "value": alert.body,
                    "short": false,
                }],
            }],
        })
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[async_trait]
impl NotificationChannel for SlackWebhookChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = self.render_payload(alert);
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(title = %alert.title, "Slack webhook accepted alert");
            return Ok(());
        }

        let body = match resp.text().await {
            Ok(text) => truncate(&text, MAX_ERROR_BODY),
            Err(e) => format!("[Failed to read response body: {e}]"),
        };
        Err(AlertDispatchError::ApiError {
            service: "slack".to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
