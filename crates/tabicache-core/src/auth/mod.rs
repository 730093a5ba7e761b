//! Secret storage for the sync source API key.
//!
//! The key lives in the OS keychain via `CredentialStore`; the
//! `TABICACHE_SYNC_KEY` environment variable takes precedence when set.

pub mod credentials;

pub use credentials::CredentialStore;
