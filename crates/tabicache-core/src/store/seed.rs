//! Bundled seed data used to repopulate the store after a reset.

use serde::Deserialize;

use super::{LocalStore, StoreError};
use crate::models::{
    Accommodation, Activity, Alert, ChecklistItem, Restaurant, TransitSegment,
};

const BUNDLED_SEED: &str = include_str!("../../data/seed.json");

#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub transit_segments: Vec<TransitSegment>,
    #[serde(default)]
    pub accommodations: Vec<Accommodation>,
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub checklist_items: Vec<ChecklistItem>,
}

impl SeedData {
    pub fn bundled() -> Result<Self, StoreError> {
        serde_json::from_str(BUNDLED_SEED).map_err(|source| StoreError::Decode {
            name: "seed".to_string(),
            source,
        })
    }

    /// Write every seed record into the store. Returns the record count.
    pub fn apply(&self, store: &LocalStore) -> Result<usize, StoreError> {
        store.put_all(&self.activities)?;
        store.put_all(&self.transit_segments)?;
        store.put_all(&self.accommodations)?;
        store.put_all(&self.restaurants)?;
        store.put_all(&self.alerts)?;
        store.put_all(&self.checklist_items)?;
        Ok(self.activities.len()
            + self.transit_segments.len()
            + self.accommodations.len()
            + self.restaurants.len()
            + self.alerts.len()
            + self.checklist_items.len())
    }
}
