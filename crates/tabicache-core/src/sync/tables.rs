use std::fmt;

use thiserror::Error;

use crate::store::Collection;

/// A table name outside the eight syncable tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown table: {0}")]
pub struct UnknownTable(pub String);

/// The eight tables shared with the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTable {
    Activities,
    TransitSegments,
    Accommodations,
    Restaurants,
    Alerts,
    LocationShares,
    AiCache,
    ChecklistItems,
}

impl SyncTable {
    pub const ALL: [SyncTable; 8] = [
        SyncTable::Activities,
        SyncTable::TransitSegments,
        SyncTable::Accommodations,
        SyncTable::Restaurants,
        SyncTable::Alerts,
        SyncTable::LocationShares,
        SyncTable::AiCache,
        SyncTable::ChecklistItems,
    ];

    pub fn remote_name(&self) -> &'static str {
        match self {
            SyncTable::Activities => "activities",
            SyncTable::TransitSegments => "transit_segments",
            SyncTable::Accommodations => "accommodations",
            SyncTable::Restaurants => "restaurants",
            SyncTable::Alerts => "alerts",
            SyncTable::LocationShares => "location_shares",
            SyncTable::AiCache => "ai_cache",
            SyncTable::ChecklistItems => "checklist_items",
        }
    }

    pub fn local_name(&self) -> &'static str {
        self.collection().name()
    }

    pub fn collection(&self) -> Collection {
        match self {
            SyncTable::Activities => Collection::Activities,
            SyncTable::TransitSegments => Collection::TransitSegments,
            SyncTable::Accommodations => Collection::Accommodations,
            SyncTable::Restaurants => Collection::Restaurants,
            SyncTable::Alerts => Collection::Alerts,
            SyncTable::LocationShares => Collection::LocationShares,
            SyncTable::AiCache => Collection::AiCache,
            SyncTable::ChecklistItems => Collection::ChecklistItems,
        }
    }

    pub fn from_remote(name: &str) -> Result<Self, UnknownTable> {
        Self::ALL
            .into_iter()
            .find(|t| t.remote_name() == name)
            .ok_or_else(|| UnknownTable(name.to_string()))
    }

    pub fn from_local(name: &str) -> Result<Self, UnknownTable> {
        Self::ALL
            .into_iter()
            .find(|t| t.local_name() == name)
            .ok_or_else(|| UnknownTable(name.to_string()))
    }
}

impl fmt::Display for SyncTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.local_name())
    }
}

/// Map a remote table name to its local collection name.
pub fn to_local_name(remote_name: &str) -> Result<&'static str, UnknownTable> {
    SyncTable::from_remote(remote_name).map(|t| t.local_name())
}

/// Map a local collection name to its remote table name.
pub fn to_remote_name(local_name: &str) -> Result<&'static str, UnknownTable> {
    SyncTable::from_local(local_name).map(|t| t.remote_name())
}
