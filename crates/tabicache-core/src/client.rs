//! The `TripClient`: one explicitly constructed object that owns the local
//! store and hands out every service built on it.
//!
//! Create it with [`TripClient::create`] (file-backed, from config) or
//! [`TripClient::with_backend`], pass it to whatever needs trip data, and
//! [`TripClient::dispose`] it on shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::auth::CredentialStore;
use crate::cache::CacheWarmer;
use crate::config::Config;
use crate::connectivity::{Connectivity, NetworkMonitor};
use crate::content::{AiResponseCache, ContentResolver, StaticContent};
use crate::currency::ExchangeRateCache;
use crate::store::{Backend, FileBackend, FlagStore, LocalStore};
use crate::sync::{SyncEngine, SyncTracker};

pub struct TripClient {
    store: Arc<LocalStore>,
    flags: Arc<FlagStore>,
    network: Arc<NetworkMonitor>,
    tracker: Arc<SyncTracker>,
    content: ContentResolver,
    ai_cache: AiResponseCache,
    rates: ExchangeRateCache,
    warmer: CacheWarmer,
    sync: SyncEngine,
}

impl TripClient {
    /// Open the file-backed store in the configured data directory.
    /// The sync API key comes from the environment or the keychain.
    pub fn create(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let backend = FileBackend::new(data_dir.clone())
            .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
        let api_key = CredentialStore::resolve(&config.sync_key_name);
        if config.sync_url.is_some() && api_key.is_none() {
            warn!("Sync URL configured but no API key found; sync is disabled");
        }
        let client = Self::with_backend(
            config,
            Arc::new(backend),
            Arc::new(NetworkMonitor::default()),
            api_key.as_deref(),
        )?;
        info!(data_dir = %data_dir.display(), "Trip client created");
        Ok(client)
    }

    pub fn with_backend(
        config: &Config,
        backend: Arc<dyn Backend>,
        network: Arc<NetworkMonitor>,
        sync_api_key: Option<&str>,
    ) -> Result<Self> {
        let store = Arc::new(LocalStore::open(Arc::clone(&backend)));
        let flags = Arc::new(FlagStore::new(backend));
        let connectivity: Arc<dyn Connectivity> = network.clone();

        let mut api = ApiClient::new()?;
        if let (Some(url), Some(key)) = (config.sync_url.as_deref(), sync_api_key) {
            api = api.with_sync_source(url, key);
        }

        let statics = StaticContent::bundled().context("Failed to load bundled tour content")?;
        let tracker = Arc::new(SyncTracker::new(Arc::clone(&store)));
        let warmer = CacheWarmer::new(
            api.clone(),
            &config.app_base_url,
            Arc::clone(&store),
            Arc::clone(&flags),
            Arc::clone(&connectivity),
        )
        .with_batch_delay(config.warm_batch_delay());
        let sync = SyncEngine::new(
            api.clone(),
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&connectivity),
        )
        .with_warmer(warmer.clone());

        Ok(Self {
            content: ContentResolver::new(statics, Arc::clone(&store), Arc::clone(&connectivity)),
            ai_cache: AiResponseCache::new(Arc::clone(&store)),
            rates: ExchangeRateCache::new(
                api,
                &config.exchange_rate_url,
                Arc::clone(&flags),
                connectivity,
            ),
            store,
            flags,
            network,
            tracker,
            warmer,
            sync,
        })
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn flags(&self) -> &Arc<FlagStore> {
        &self.flags
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    pub fn content(&self) -> &ContentResolver {
        &self.content
    }

    pub fn ai_cache(&self) -> &AiResponseCache {
        &self.ai_cache
    }

    pub fn rates(&self) -> &ExchangeRateCache {
        &self.rates
    }

    pub fn warmer(&self) -> &CacheWarmer {
        &self.warmer
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    /// Close the store and the flags. Services still held elsewhere fail
    /// with a closed store error from here on.
    pub fn dispose(self) {
        self.store.close();
        self.flags.close();
        info!("Trip client disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::NetworkStatus;
    use crate::models::ChecklistItem;
    use crate::store::flags::LAST_CACHE_WARM_KEY;
    use crate::store::{MemoryBackend, StoreError};

    fn memory_client() -> TripClient {
        TripClient::with_backend(
            &Config::default(),
            Arc::new(MemoryBackend::new()),
            Arc::new(NetworkMonitor::new(NetworkStatus::Offline)),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_client_wires_shared_store() {
        let client = memory_client();
        client.store().reset().unwrap();
        assert!(client.content().has_content("senso-ji-temple"));
        assert!(!client.store().get_all::<ChecklistItem>().unwrap().is_empty());
        assert_eq!(client.network().status(), NetworkStatus::Offline);
    }

    #[test]
    fn test_dispose_closes_store() {
        let client = memory_client();
        let store = Arc::clone(client.store());
        client.dispose();
        assert!(!store.is_open());
        assert!(matches!(store.get_all::<ChecklistItem>(), Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_services_held_past_dispose_stop_writing_flags() {
        let client = memory_client();
        let flags = Arc::clone(client.flags());
        let warmer = client.warmer().clone();
        client.dispose();

        assert!(!flags.is_open());
        assert!(matches!(
            flags.set(LAST_CACHE_WARM_KEY, "1700000000000"),
            Err(StoreError::Closed)
        ));
        assert!(warmer.last_warmed().is_none());
    }

    #[tokio::test]
    async fn test_network_changes_reach_services() {
        let client = memory_client();
        let quote = client.rates().get_rate().await;
        assert!(quote.is_fallback);

        client.network().set_status(NetworkStatus::Online);
        assert!(client.content().needs_generation("nezu-shrine"));
    }

    #[tokio::test]
    async fn test_sync_disabled_without_key() {
        let config = Config {
            sync_url: Some("http://127.0.0.1:9".to_string()),
            ..Config::default()
        };
        let client = TripClient::with_backend(
            &config,
            Arc::new(MemoryBackend::new()),
            Arc::new(NetworkMonitor::default()),
            None,
        )
        .unwrap();
        assert!(client.sync().sync_all().await.is_err());
    }
}
