//! Persistence layer for monitored endpoints.
//!
//! The pipeline only needs three things from storage: select monitors,
//! insert a monitor the first time its id is seen, and overwrite the stored
//! certificate expiry. [`engine::SqliteMonitorStore`] is the default backend.

pub mod engine;
pub mod error;


use certwatch_common::types::Monitor;
use chrono::{DateTime, Utc};

pub use error::{Result, StoreError};

/// Which monitors a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSelector {
    /// Every stored monitor.
    All,
    /// Monitors whose stored expiry is strictly earlier than the instant.
    /// Monitors that were never probed are excluded.
    ExpiringBefore(DateTime<Utc>),
}

/// Persisted collection of [`Monitor`] records keyed by id.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the scanner writes from concurrently running probe tasks.
pub trait MonitorStore: Send + Sync {
    /// Returns the monitors matching `selector`, ordered by id.
    fn find(&self, selector: MonitorSelector) -> Result<Vec<Monitor>>;

    /// Looks up a single monitor by id.
    fn find_by_id(&self, id: &str) -> Result<Option<Monitor>>;

    /// Inserts `monitor` unless a record with the same id already exists.
    /// Returns `true` when a row was written.
    fn insert_if_absent(&self, monitor: &Monitor) -> Result<bool>;

    /// Overwrites the stored expiry of monitor `id`. Returns `false` if no
    /// such monitor exists.
    fn update_valid_to(&self, id: &str, valid_to: DateTime<Utc>) -> Result<bool>;
}
