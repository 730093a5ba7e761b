//! Guide content, cached assistant replies and the cached exchange rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tour guide entry for a location. Static entries ship with the app;
/// dynamic ones are generated later and persisted under the same
/// `location_id` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TourContent {
    pub id: String,
    pub location_id: String,
    pub title: String,
    #[serde(default)]
    pub title_japanese: Option<String>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub etiquette_tips: Vec<String>,
}

/// A cached assistant reply, keyed by the normalized query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct AiCacheEntry {
    pub id: String,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted exchange rate slot. Serialized with camelCase keys so the blob
/// stays readable by the web client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct CachedExchangeRate {
    /// JPY per USD. Always > 0 when stored.
    pub rate: f64,
    /// Epoch milliseconds of the successful refresh.
    pub timestamp: i64,
    pub is_offline: bool,
}

impl CachedExchangeRate {
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}
