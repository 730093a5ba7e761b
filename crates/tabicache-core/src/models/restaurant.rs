//! Restaurant reservations and their meal assignments.
//!
//! The remote source stores which days a restaurant is planned for as a
//! JSON-encoded text column. That payload is decoded here, at the storage
//! boundary, into a versioned schema:
//!
//! - v1: a bare array `[{"date": "2025-03-21", "meal": "dinner"}, ...]`
//! - v2: `{"version": 2, "entries": [...]}`
//!
//! Anything else is rejected with an [`AssignmentError`] so callers can
//! quarantine the row instead of parsing ad hoc.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Newest assignment payload version this build understands.
pub const ASSIGNMENT_SCHEMA_VERSION: u32 = 2;

#[derive(Error, Debug)]
pub enum AssignmentError {
    #[error("Malformed meal assignment payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported meal assignment schema version {0}")]
    UnsupportedVersion(u32),
}

/// One day/meal slot a restaurant is planned for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct MealAssignment {
    pub date: NaiveDate,
    #[serde(default)]
    pub meal: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AssignmentPayload {
    Versioned {
        version: u32,
        entries: Vec<MealAssignment>,
    },
    Legacy(Vec<MealAssignment>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub reservation_time: Option<String>,
    /// Raw JSON text column; see [`Restaurant::assignments`].
    #[serde(default)]
    pub meal_assignments: Option<String>,
    /// Meal picked by the user on device.
    #[serde(default)]
    pub selected_meal: Option<String>,
}

impl Restaurant {
    /// Decode the assignment column. A missing or blank column is an empty
    /// list, not an error.
    pub fn assignments(&self) -> Result<Vec<MealAssignment>, AssignmentError> {
        match self.meal_assignments.as_deref().map(str::trim) {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => decode_assignments(raw),
        }
    }

    /// Encode assignments back into the current schema version.
    pub fn set_assignments(&mut self, entries: &[MealAssignment]) -> Result<(), AssignmentError> {
        let payload = serde_json::json!({
            "version": ASSIGNMENT_SCHEMA_VERSION,
            "entries": entries,
        });
        self.meal_assignments = Some(serde_json::to_string(&payload)?);
        Ok(())
    }
}

pub fn decode_assignments(raw: &str) -> Result<Vec<MealAssignment>, AssignmentError> {
    match serde_json::from_str::<AssignmentPayload>(raw)? {
        AssignmentPayload::Legacy(entries) => Ok(entries),
        AssignmentPayload::Versioned { version, entries } => {
            if version == 0 || version > ASSIGNMENT_SCHEMA_VERSION {
                Err(AssignmentError::UnsupportedVersion(version))
            } else {
                Ok(entries)
            }
        }
    }
}
