//! Sync bookkeeping between the local store and the remote source.
//!
//! - `tables`: the fixed bijection between remote (snake_case) and local
//!   (camelCase) table names
//! - `tracker`: persisted last-sync timestamps plus in-memory sync flags
//! - `engine`: pulls remote rows into the local store, table by table

pub mod engine;
pub mod tables;
pub mod tracker;

pub use engine::{SyncEngine, SyncReport, TableOutcome};
pub use tables::{to_local_name, to_remote_name, SyncTable, UnknownTable};
pub use tracker::SyncTracker;
