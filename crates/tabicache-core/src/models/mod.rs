//! Data models for trip entities.
//!
//! This module contains all the data structures persisted in the local
//! store and exchanged with the remote sync source:
//!
//! - `Activity`, `TransitSegment`, `Accommodation`, `Alert`, `LocationShare`,
//!   `ChecklistItem`: the day-by-day trip plan
//! - `Restaurant`, `MealAssignment`: reservations and their assigned days
//! - `TourContent`, `AiCacheEntry`: guide content and cached assistant replies
//! - `SyncMeta`, `SyncStatus`: per-table sync bookkeeping
//! - `CachedExchangeRate`: the single-slot currency cache

pub mod content;
pub mod restaurant;
pub mod sync;
pub mod trip;

pub use content::{AiCacheEntry, CachedExchangeRate, TourContent};
pub use restaurant::{AssignmentError, MealAssignment, Restaurant, ASSIGNMENT_SCHEMA_VERSION};
pub use sync::{SyncMeta, SyncStatus};
pub use trip::{Accommodation, Activity, Alert, ChecklistItem, LocationShare, TransitSegment};
