//! Core library for tabicache: an offline-first store for a family trip.
//!
//! The pieces, leaves first:
//! - `store`: keyed entity collections and persisted flags
//! - `sync`: remote/local table names, sync bookkeeping, the sync engine
//! - `content`: bundled-then-cached tour content and assistant replies
//! - `cache`: offline page cache warming
//! - `currency`: the USD/JPY rate cache
//! - `client`: `TripClient`, which wires all of the above together

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod content;
pub mod currency;
pub mod models;
pub mod store;
pub mod sync;

pub use client::TripClient;
pub use config::Config;
pub use connectivity::{Connectivity, NetworkMonitor, NetworkStatus};
