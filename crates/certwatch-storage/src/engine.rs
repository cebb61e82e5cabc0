use certwatch_common::types::Monitor;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::{MonitorSelector, MonitorStore};

const MONITORS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS monitors (
    id TEXT PRIMARY KEY,
    friendly_name TEXT NOT NULL,
    url TEXT NOT NULL,
    valid_to INTEGER
);
CREATE INDEX IF NOT EXISTS idx_monitors_valid_to ON monitors(valid_to);
";

const DB_FILE: &str = "certwatch.db";

/// SQLite-backed [`MonitorStore`]. `valid_to` is kept as unix seconds, which
/// matches the precision of an X.509 validity field.
pub struct SqliteMonitorStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteMonitorStore {
    /// Opens (creating if needed) `certwatch.db` inside `data_dir`.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DB_FILE);
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(MONITORS_SCHEMA)?;
        tracing::info!(path = %db_path.display(), "Initialized monitor store");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn row_to_monitor(row: &Row<'_>) -> rusqlite::Result<(Monitor, Option<i64>)> {
        let monitor = Monitor {
            id: row.get(0)?,
            friendly_name: row.get(1)?,
            url: row.get(2)?,
            valid_to: None,
        };
        Ok((monitor, row.get(3)?))
    }

    fn resolve_valid_to((mut monitor, raw): (Monitor, Option<i64>)) -> Result<Monitor> {
        if let Some(secs) = raw {
            let ts = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
                StoreError::InvalidTimestamp {
                    id: monitor.id.clone(),
                    value: secs,
                }
            })?;
            monitor.valid_to = Some(ts);
        }
        Ok(monitor)
    }
}

/// Smallest whole second not earlier than `t`. Stored expiries are whole
/// seconds, so `valid_to < ceil(t)` matches exactly the rows before `t`.
fn ceil_seconds(t: DateTime<Utc>) -> i64 {
    t.timestamp() + i64::from(t.timestamp_subsec_nanos() > 0)
}

impl MonitorStore for SqliteMonitorStore {
    fn find(&self, selector: MonitorSelector) -> Result<Vec<Monitor>> {
        let conn = self.conn();
        let rows = match selector {
            MonitorSelector::All => {
                let mut stmt = conn.prepare(
                    "SELECT id, friendly_name, url, valid_to FROM monitors ORDER BY id",
                )?;
                let rows = stmt
                    .query_map([], Self::row_to_monitor)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            MonitorSelector::ExpiringBefore(deadline) => {
                let mut stmt = conn.prepare(
                    "SELECT id, friendly_name, url, valid_to FROM monitors
                     WHERE valid_to IS NOT NULL AND valid_to < ?1
                     ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![ceil_seconds(deadline)], Self::row_to_monitor)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        rows.into_iter().map(Self::resolve_valid_to).collect()
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Monitor>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, friendly_name, url, valid_to FROM monitors WHERE id = ?1",
                rusqlite::params![id],
                Self::row_to_monitor,
            )
            .optional()?;
        row.map(Self::resolve_valid_to).transpose()
    }

    fn insert_if_absent(&self, monitor: &Monitor) -> Result<bool> {
        let conn = self.conn();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO monitors (id, friendly_name, url, valid_to)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                monitor.id,
                monitor.friendly_name,
                monitor.url,
                monitor.valid_to.map(|t| t.timestamp()),
            ],
        )?;
        Ok(changed == 1)
    }

    fn update_valid_to(&self, id: &str, valid_to: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE monitors SET valid_to = ?1 WHERE id = ?2",
            rusqlite::params![valid_to.timestamp(), id],
        )?;
        Ok(changed > 0)
    }
}
