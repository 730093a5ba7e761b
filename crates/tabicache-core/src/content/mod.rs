//! Read-through content caches.
//!
//! - `ContentResolver`: tour guide content, bundled first, then generated
//!   content persisted in the local store
//! - `AiResponseCache`: assistant replies keyed by normalized query

pub mod ai;
pub mod tour;

pub use ai::AiResponseCache;
pub use tour::{normalize_label, ContentResolver, StaticContent};
