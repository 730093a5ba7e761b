use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{SyncMeta, SyncStatus};
use crate::store::{LocalStore, StoreError};

#[derive(Debug, Default, Clone)]
struct TransientState {
    is_syncing: bool,
    error: Option<String>,
}

/// Records per-table sync times in the local store and keeps the
/// in-memory syncing/error flags.
///
/// Retries are left to the caller. Concurrent syncs of the same table are
/// not deduplicated; the last `record_sync` wins.
pub struct SyncTracker {
    store: Arc<LocalStore>,
    transient: Mutex<HashMap<String, TransientState>>,
}

impl SyncTracker {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            transient: Mutex::new(HashMap::new()),
        }
    }

    /// Set `last_synced_at` for a table to now, creating its record if
    /// absent. Storage failures are returned to the caller.
    pub fn record_sync(&self, table_name: &str) -> Result<DateTime<Utc>, StoreError> {
        let now = Utc::now();
        self.store.put(&SyncMeta {
            table_name: table_name.to_string(),
            last_synced_at: Some(now),
        })?;
        debug!(table = table_name, "Recorded sync time");
        Ok(now)
    }

    pub fn last_synced_at(&self, table_name: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .store
            .get::<SyncMeta>(table_name)?
            .and_then(|meta| meta.last_synced_at))
    }

    /// Persisted timestamp plus the in-memory flags for a table.
    pub fn get_sync_status(&self, table_name: &str) -> SyncStatus {
        let last_synced_at = match self.last_synced_at(table_name) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(table = table_name, error = %e, "Failed to read sync metadata");
                None
            }
        };
        let state = self.transient_state(table_name);
        SyncStatus {
            table_name: table_name.to_string(),
            last_synced_at,
            is_syncing: state.is_syncing,
            error: state.error,
        }
    }

    pub fn mark_syncing(&self, table_name: &str) {
        self.with_state(table_name, |state| {
            state.is_syncing = true;
            state.error = None;
        });
    }

    pub fn mark_succeeded(&self, table_name: &str) {
        self.with_state(table_name, |state| {
            state.is_syncing = false;
            state.error = None;
        });
    }

    pub fn mark_failed(&self, table_name: &str, error: impl Into<String>) {
        let error = error.into();
        self.with_state(table_name, |state| {
            state.is_syncing = false;
            state.error = Some(error);
        });
    }

    fn transient_state(&self, table_name: &str) -> TransientState {
        let states = self.transient.lock().unwrap_or_else(|e| e.into_inner());
        states.get(table_name).cloned().unwrap_or_default()
    }

    fn with_state(&self, table_name: &str, apply: impl FnOnce(&mut TransientState)) {
        let mut states = self.transient.lock().unwrap_or_else(|e| e.into_inner());
        apply(states.entry(table_name.to_string()).or_default());
    }
}
