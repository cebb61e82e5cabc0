/// Errors raised by a [`crate::MonitorStore`] implementation.
///
/// # Examples
///
/// ```rust
/// use certwatch_storage::error::StoreError;
///
/// let err = StoreError::InvalidTimestamp {
///     id: "776".to_string(),
///     value: i64::MAX,
/// };
/// assert!(err.to_string().contains("776"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An underlying SQLite error.
    #[error("Store: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The data directory could not be created.
    #[error("Store: failed to prepare data directory: {0}")]
    Io(#[from] std::io::Error),

    /// A stored expiry cannot be represented as a UTC timestamp.
    #[error("Store: monitor {id} holds an out-of-range valid_to ({value})")]
    InvalidTimestamp { id: String, value: i64 },
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
