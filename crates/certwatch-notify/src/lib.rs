//! Alert formatting and delivery.
//!
//! [`engine::NotificationEngine`] turns monitor expiry state into [`Alert`]s
//! and hands each one to every registered [`NotificationChannel`]. The
//! built-in channel posts Slack-style incoming-webhook attachments.

pub mod channels;
pub mod engine;
pub mod error;
pub mod humanize;


use async_trait::async_trait;
use certwatch_common::types::Alert;

pub use error::AlertDispatchError;

/// A delivery channel that sends rendered alerts to an external service.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers one alert. No retries are attempted.
    async fn send(&self, alert: &Alert) -> error::Result<()>;

    /// Returns the channel type name (e.g., `"slack"`).
    fn channel_name(&self) -> &str;
}
