//! Offline page cache warming.
//!
//! After a sync the `CacheWarmer` requests every page the app can show so
//! the service worker holds them for offline use. Nothing but the "last
//! warmed" timestamp is persisted.

pub mod warmer;

pub use warmer::{CacheWarmer, CohortCount, WarmOutcome, WarmReport, WARM_BATCH_SIZE};
