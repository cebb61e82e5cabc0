/// Errors that can occur while paginating the external monitor registry.
///
/// # Examples
///
/// ```rust
/// use certwatch_registry::error::RegistryError;
///
/// let err = RegistryError::Api {
///     id: "100".to_string(),
///     message: "apiKey not mentioned".to_string(),
/// };
/// assert!(err.to_string().contains("apiKey"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// HTTP-level error: non-2xx status code from the registry API.
    #[error("Registry API HTTP error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// The registry answered 2xx but reported a failure in the payload.
    #[error("Registry API error: id={id}, message={message}")]
    Api { id: String, message: String },

    /// An underlying HTTP transport error from `reqwest`.
    #[error("Registry network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body is not the expected JSON document.
    #[error("Registry decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Client configuration is missing or invalid.
    #[error("Registry configuration error: {0}")]
    Config(String),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, RegistryError>;
