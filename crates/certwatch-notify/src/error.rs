/// Errors raised while handing an alert to a notification channel.
///
/// Callers log these and move on; an alert is never retried.
///
/// # Examples
///
/// ```rust
/// use certwatch_notify::error::AlertDispatchError;
///
/// let err = AlertDispatchError::InvalidConfig("missing webhook_url".to_string());
/// assert!(err.to_string().contains("webhook_url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertDispatchError {
    /// Channel configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP request to the notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, AlertDispatchError>;
