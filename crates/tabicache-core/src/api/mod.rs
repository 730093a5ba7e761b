//! HTTP client module for the remote services the app talks to.
//!
//! This module provides the `ApiClient` used for:
//! - pulling table rows from the PostgREST-style sync source
//! - fetching app pages to warm the offline page cache
//! - fetching the USD to JPY exchange rate
//!
//! The sync source authenticates with an `apikey` header plus a bearer
//! token carrying the same key.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
