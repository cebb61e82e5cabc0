use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Forward window, in days, within which a certificate counts as expiring soon.
pub const EXPIRY_HORIZON_DAYS: i64 = 7;

/// A rechecked certificate counts as renewed once its expiry lies more than
/// this many days past the scan instant. Kept one day wider than the horizon.
pub const RENEWAL_MARGIN_DAYS: i64 = 8;

pub fn expiry_horizon() -> Duration {
    Duration::days(EXPIRY_HORIZON_DAYS)
}

pub fn renewal_margin() -> Duration {
    Duration::days(RENEWAL_MARGIN_DAYS)
}

/// Rewrites an `http://` or `https://` URL onto the secure scheme. Anything
/// else yields `None`.
pub fn secure_url_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.trim().split_once("://")?;
    if rest.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
        Some(format!("https://{rest}"))
    } else {
        None
    }
}

/// A monitor definition as published by the external registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorDefinition {
    pub id: String,
    pub friendly_name: String,
    pub url: String,
}

/// A tracked endpoint together with its last observed certificate expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    /// Registry identifier, primary key.
    pub id: String,
    pub friendly_name: String,
    pub url: String,
    /// `None` until the first successful probe.
    pub valid_to: Option<DateTime<Utc>>,
}

impl Monitor {
    /// Builds a freshly ingested monitor with no known expiry.
    pub fn from_definition(def: MonitorDefinition) -> Self {
        Self {
            id: def.id,
            friendly_name: def.friendly_name,
            url: def.url,
            valid_to: None,
        }
    }

    /// Returns the URL rewritten onto the secure scheme, or `None` when the
    /// monitor does not point at an HTTP(S) endpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use certwatch_common::types::Monitor;
    ///
    /// let mut monitor = Monitor {
    ///     id: "776".into(),
    ///     friendly_name: "Shop".into(),
    ///     url: "http://shop.example.com/health".into(),
    ///     valid_to: None,
    /// };
    /// assert_eq!(
    ///     monitor.secure_url().as_deref(),
    ///     Some("https://shop.example.com/health")
    /// );
    ///
    /// monitor.url = "10.0.0.4".into();
    /// assert!(monitor.secure_url().is_none());
    /// ```
    pub fn secure_url(&self) -> Option<String> {
        secure_url_of(&self.url)
    }

    /// True if the stored expiry is earlier than `deadline`. Monitors that
    /// were never probed are not considered expiring.
    pub fn expires_before(&self, deadline: DateTime<Utc>) -> bool {
        self.valid_to.is_some_and(|valid_to| valid_to < deadline)
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use certwatch_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A rendered alert ready to be handed to a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
    /// Plain-text summary for clients that cannot render the body.
    pub fallback: String,
    pub severity: Severity,
}

impl Alert {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        let body = body.into();
        Self {
            title: title.into(),
            fallback: body.clone(),
            body,
            severity,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }
}
