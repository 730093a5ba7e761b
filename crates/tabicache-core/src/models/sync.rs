//! Sync bookkeeping types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted record of the last successful sync of one table.
/// At most one exists per `table_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SyncMeta {
    pub table_name: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Sync state of a table as seen by the UI. `is_syncing` and `error` live
/// in memory only and reset whenever the process restarts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SyncStatus {
    pub table_name: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_syncing: bool,
    pub error: Option<String>,
}
