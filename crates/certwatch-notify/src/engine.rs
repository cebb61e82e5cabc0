use crate::humanize::from_now;
use crate::NotificationChannel;
use certwatch_common::types::{expiry_horizon, Alert, Monitor, Severity};
use chrono::{DateTime, Utc};

pub const ALL_CLEAR_TITLE: &str = "OK";
pub const ALL_CLEAR_BODY: &str = "All certificates OK";
pub const EXPIRED_TITLE: &str = "Expired";
pub const EXPIRING_SOON_TITLE: &str = "Expiring Soon";
pub const RENEWAL_TITLE: &str = "Renewal";

/// Monitors split by whether their certificate has already lapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryPartition {
    /// `valid_to <= now`, ascending by `valid_to`.
    pub expired: Vec<Monitor>,
    /// `now < valid_to < now + horizon`, ascending by `valid_to`.
    pub expiring_soon: Vec<Monitor>,
}

impl ExpiryPartition {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.expiring_soon.is_empty()
    }
}

/// Splits `monitors` into expired and expiring-soon buckets.
///
/// Monitors without a known expiry, or whose expiry lies at or beyond the
/// horizon, land in neither bucket.
pub fn partition(monitors: &[Monitor], now: DateTime<Utc>) -> ExpiryPartition {
    let deadline = now + expiry_horizon();
    let mut eligible: Vec<(DateTime<Utc>, &Monitor)> = monitors
        .iter()
        .filter_map(|m| m.valid_to.map(|v| (v, m)))
        .filter(|(valid_to, _)| *valid_to < deadline)
        .collect();
    eligible.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

    let mut result = ExpiryPartition::default();
    for (valid_to, monitor) in eligible {
        if valid_to > now {
            result.expiring_soon.push(monitor.clone());
        } else {
            result.expired.push(monitor.clone());
        }
    }
    result
}

fn escape_label(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `<https://host|Label>` link for chat rendering. Monitors without an
/// HTTP(S) URL link to their raw URL.
pub fn monitor_link(monitor: &Monitor) -> String {
    let target = monitor.secure_url().unwrap_or_else(|| monitor.url.clone());
    format!("<{}|{}>", target, escape_label(&monitor.friendly_name))
}

fn render_lines(monitors: &[Monitor], now: DateTime<Utc>) -> String {
    monitors
        .iter()
        .filter_map(|m| {
            m.valid_to
                .map(|valid_to| format!("{} {}", monitor_link(m), from_now(valid_to, now)))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the alerts for a notify run: one per non-empty bucket, or a single
/// all-clear alert when nothing is expired or expiring.
pub fn build_expiry_alerts(monitors: &[Monitor], now: DateTime<Utc>) -> Vec<Alert> {
    let split = partition(monitors, now);
    if split.is_empty() {
        return vec![Alert::new(ALL_CLEAR_TITLE, ALL_CLEAR_BODY, Severity::Info)];
    }

    let mut alerts = Vec::with_capacity(2);
    if !split.expired.is_empty() {
        let list = render_lines(&split.expired, now);
        alerts.push(
            Alert::new(EXPIRED_TITLE, list.clone(), Severity::Critical)
                .with_fallback(format!("{EXPIRED_TITLE}: {list}")),
        );
    }
    if !split.expiring_soon.is_empty() {
        let list = render_lines(&split.expiring_soon, now);
        alerts.push(
            Alert::new(EXPIRING_SOON_TITLE, list.clone(), Severity::Warning)
                .with_fallback(format!("{EXPIRING_SOON_TITLE}: {list}")),
        );
    }
    alerts
}

/// Renders the alert announcing that `monitor` now holds a certificate valid
/// until `valid_to`.
pub fn build_renewal_alert(monitor: &Monitor, valid_to: DateTime<Utc>) -> Alert {
    Alert::new(
        RENEWAL_TITLE,
        format!(
            "{} until {}",
            monitor_link(monitor),
            valid_to.format("%-d-%b-%Y")
        ),
        Severity::Info,
    )
}

/// Formats alerts and fans them out to every registered channel.
///
/// Delivery is best effort: a channel failure is logged and never reaches the
/// caller.
pub struct NotificationEngine {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationEngine {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[Box<dyn NotificationChannel>] {
        &self.channels
    }

    /// Sends the expired / expiring-soon report for `monitors`. Returns the
    /// number of alerts rendered.
    pub async fn notify(&self, monitors: &[Monitor], now: DateTime<Utc>) -> usize {
        let alerts = build_expiry_alerts(monitors, now);
        for alert in &alerts {
            tracing::info!(
                title = %alert.title,
                severity = %alert.severity,
                "Dispatching expiry alert"
            );
            self.dispatch(alert).await;
        }
        alerts.len()
    }

    pub async fn notify_renewal(&self, monitor: &Monitor, valid_to: DateTime<Utc>) {
        let alert = build_renewal_alert(monitor, valid_to);
        tracing::info!(monitor = %monitor.friendly_name, "Dispatching renewal alert");
        self.dispatch(&alert).await;
    }

    /// Hands `alert` to every channel. Returns how many accepted it.
    pub async fn dispatch(&self, alert: &Alert) -> usize {
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.send(alert).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::error!(
                        channel = channel.channel_name(),
                        title = %alert.title,
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        }
        delivered
    }
}
