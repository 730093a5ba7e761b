//! Domain models for the trip plan.
//!
//! Field names follow the remote source's snake_case columns so rows decode
//! directly. Dates are ISO `YYYY-MM-DD`; times are kept as the `HH:MM`
//! strings the source stores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled activity on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Activity {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Link into the tour guide content, when one exists.
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl Activity {
    /// Time range for display, e.g. "09:00 - 11:30".
    pub fn time_range(&self) -> Option<String> {
        match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) => Some(format!("{} - {}", start, end)),
            (Some(start), None) => Some(start.clone()),
            _ => None,
        }
    }
}

/// A train, bus or flight leg between two places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TransitSegment {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Activity this leg leads to.
    #[serde(default)]
    pub activity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Accommodation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub confirmation_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Accommodation {
    /// Number of nights booked.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(0)
    }
}

/// A travel notice shown on the home screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Alert {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub dismissed: bool,
}

/// Last reported position of a family member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct LocationShare {
    pub id: String,
    pub member_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub sort_order: i32,
}
