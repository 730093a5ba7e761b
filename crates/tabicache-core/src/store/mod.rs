//! Local persistence for offline trip data.
//!
//! This module provides the `LocalStore` for keyed entity collections and
//! the `FlagStore` for small persisted string flags. Both sit on a
//! pluggable `Backend`: JSON files in the data directory for the app, or an
//! in-memory map for tests and ephemeral sessions.
//!
//! Collections:
//! - activities, transitSegments, accommodations, restaurants
//! - alerts, locationShares, aiCache, checklistItems
//! - syncMeta, tourContent

pub mod backend;
pub mod error;
pub mod flags;
pub mod local;
pub mod seed;

pub use backend::{Backend, FileBackend, MemoryBackend};
pub use error::StoreError;
pub use flags::FlagStore;
pub use local::{age_display, CachedData, Collection, LocalStore, Record};
pub use seed::SeedData;
