//! Pulls remote tables into the local store.
//!
//! Remote rows replace the local collection wholesale; local edits made
//! since the last sync (checklist ticks, meal selections) are overwritten.
//! Rows that do not decode into the local record type are quarantined:
//! logged, counted and left out of the store.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{SyncTable, SyncTracker};
use crate::api::{ApiClient, ApiError};
use crate::cache::{CacheWarmer, WarmOutcome};
use crate::connectivity::Connectivity;
use crate::content::ai::query_key;
use crate::models::{
    Accommodation, Activity, AiCacheEntry, Alert, ChecklistItem, LocationShare, Restaurant,
    TransitSegment,
};
use crate::store::{LocalStore, Record};

/// Result of syncing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableSync {
    pub rows: usize,
    pub quarantined: usize,
}

#[derive(Debug)]
pub struct TableOutcome {
    pub table: SyncTable,
    pub result: Result<TableSync, String>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub skipped_offline: bool,
    pub outcomes: Vec<TableOutcome>,
    /// Background cache warm started after the sync. Dropping the handle
    /// leaves the task running detached.
    pub warm_task: Option<JoinHandle<WarmOutcome>>,
}

impl SyncReport {
    pub fn failed(&self) -> impl Iterator<Item = &TableOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn total_rows(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|s| s.rows)
            .sum()
    }
}

fn decode_rows<T: Record>(table: SyncTable, rows: Vec<serde_json::Value>) -> (Vec<T>, usize) {
    let mut records = Vec::with_capacity(rows.len());
    let mut quarantined = 0;
    for row in rows {
        match serde_json::from_value::<T>(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(table = %table, error = %e, "Quarantined malformed remote row");
                quarantined += 1;
            }
        }
    }
    (records, quarantined)
}

#[derive(Clone)]
pub struct SyncEngine {
    api: ApiClient,
    store: Arc<LocalStore>,
    tracker: Arc<SyncTracker>,
    connectivity: Arc<dyn Connectivity>,
    warmer: Option<CacheWarmer>,
}

impl SyncEngine {
    pub fn new(
        api: ApiClient,
        store: Arc<LocalStore>,
        tracker: Arc<SyncTracker>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            api,
            store,
            tracker,
            connectivity,
            warmer: None,
        }
    }

    /// Run this warmer after every full sync.
    pub fn with_warmer(mut self, warmer: CacheWarmer) -> Self {
        self.warmer = Some(warmer);
        self
    }

    /// Sync one table, keeping its transient status current.
    pub async fn sync_table(&self, table: SyncTable) -> Result<TableSync> {
        let name = table.local_name();
        self.tracker.mark_syncing(name);
        match self.pull_table(table).await {
            Ok(synced) => {
                self.tracker.mark_succeeded(name);
                Ok(synced)
            }
            Err(e) => {
                self.tracker.mark_failed(name, format!("{:#}", e));
                Err(e)
            }
        }
    }

    async fn pull_table(&self, table: SyncTable) -> Result<TableSync> {
        let rows = self.api.fetch_table(table).await?;

        let synced = match table {
            SyncTable::Activities => self.replace::<Activity>(table, rows)?,
            SyncTable::TransitSegments => self.replace::<TransitSegment>(table, rows)?,
            SyncTable::Accommodations => self.replace::<Accommodation>(table, rows)?,
            SyncTable::Restaurants => self.replace_restaurants(rows)?,
            SyncTable::Alerts => self.replace::<Alert>(table, rows)?,
            SyncTable::LocationShares => self.replace::<LocationShare>(table, rows)?,
            SyncTable::AiCache => self.replace_ai_cache(rows)?,
            SyncTable::ChecklistItems => self.replace::<ChecklistItem>(table, rows)?,
        };

        self.tracker
            .record_sync(table.local_name())
            .with_context(|| format!("Failed to record sync time for {}", table))?;

        info!(table = %table, rows = synced.rows, quarantined = synced.quarantined, "Table synced");
        Ok(synced)
    }

    fn replace<T: Record>(&self, table: SyncTable, rows: Vec<serde_json::Value>) -> Result<TableSync> {
        let (records, quarantined) = decode_rows::<T>(table, rows);
        self.store
            .replace_all(&records)
            .with_context(|| format!("Failed to store {}", table))?;
        Ok(TableSync {
            rows: records.len(),
            quarantined,
        })
    }

    /// Restaurants are stored even when their assignment payload is bad;
    /// such rows are counted as quarantined and skipped by the cache warmer.
    fn replace_restaurants(&self, rows: Vec<serde_json::Value>) -> Result<TableSync> {
        let table = SyncTable::Restaurants;
        let (records, mut quarantined) = decode_rows::<Restaurant>(table, rows);
        for restaurant in &records {
            if let Err(e) = restaurant.assignments() {
                warn!(restaurant = %restaurant.id, error = %e, "Quarantined meal assignments");
                quarantined += 1;
            }
        }
        self.store
            .replace_all(&records)
            .with_context(|| format!("Failed to store {}", table))?;
        Ok(TableSync {
            rows: records.len(),
            quarantined,
        })
    }

    /// Remote replies carry their own row ids; locally they are keyed by
    /// normalized query so `AiResponseCache` lookups find them.
    fn replace_ai_cache(&self, rows: Vec<serde_json::Value>) -> Result<TableSync> {
        let table = SyncTable::AiCache;
        let (mut records, quarantined) = decode_rows::<AiCacheEntry>(table, rows);
        for entry in &mut records {
            entry.id = query_key(&entry.query);
        }
        self.store
            .replace_all(&records)
            .with_context(|| format!("Failed to store {}", table))?;
        Ok(TableSync {
            rows: records.len(),
            quarantined,
        })
    }

    /// Sync all eight tables in order, then start the cache warmer in the
    /// background. Individual table failures are reported, not returned.
    pub async fn sync_all(&self) -> Result<SyncReport> {
        if !self.api.has_sync_source() {
            return Err(ApiError::NotConfigured.into());
        }
        if !self.connectivity.is_online() {
            debug!("Offline, skipping sync");
            return Ok(SyncReport {
                skipped_offline: true,
                ..SyncReport::default()
            });
        }

        info!("Starting full sync");
        let mut outcomes = Vec::with_capacity(SyncTable::ALL.len());
        for table in SyncTable::ALL {
            let result = self
                .sync_table(table)
                .await
                .map_err(|e| format!("{:#}", e));
            if let Err(ref e) = result {
                warn!(table = %table, error = %e, "Table sync failed");
            }
            outcomes.push(TableOutcome { table, result });
        }

        let warm_task = self.warmer.clone().map(|warmer| {
            tokio::spawn(async move { warmer.warm_all_caches().await })
        });

        Ok(SyncReport {
            skipped_offline: false,
            outcomes,
            warm_task,
        })
    }
}
