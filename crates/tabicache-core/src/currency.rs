//! USD/JPY exchange rate with a single-slot persisted cache.
//!
//! Resolution: refresh from the remote endpoint when online and the cached
//! rate is missing or older than 24 hours; otherwise serve the cached rate
//! (flagged offline when stale or disconnected); with no cache at all,
//! serve [`FALLBACK_RATE`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::connectivity::Connectivity;
use crate::models::CachedExchangeRate;
use crate::store::flags::EXCHANGE_RATE_KEY;
use crate::store::FlagStore;

/// JPY per USD used when nothing better is known.
pub const FALLBACK_RATE: f64 = 150.0;

/// Age after which the cached rate is refreshed.
const RATE_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateQuote {
    pub rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_offline: bool,
    pub is_fallback: bool,
}

impl RateQuote {
    pub fn usd_to_jpy(&self, usd: f64) -> i64 {
        usd_to_jpy(usd, self.rate)
    }

    pub fn jpy_to_usd(&self, jpy: f64) -> f64 {
        jpy_to_usd(jpy, self.rate)
    }
}

/// Rounded to the nearest yen.
pub fn usd_to_jpy(usd: f64, rate: f64) -> i64 {
    (usd * rate).round() as i64
}

/// Rounded to the cent.
pub fn jpy_to_usd(jpy: f64, rate: f64) -> f64 {
    ((jpy / rate) * 100.0).round() / 100.0
}

/// Timestamps in the future count as expired.
fn is_expired(cached: &CachedExchangeRate, now: DateTime<Utc>) -> bool {
    let age_ms = now.timestamp_millis().saturating_sub(cached.timestamp);
    age_ms < 0 || age_ms > Duration::hours(RATE_TTL_HOURS).num_milliseconds()
}

pub struct ExchangeRateCache {
    api: ApiClient,
    endpoint: String,
    flags: Arc<FlagStore>,
    connectivity: Arc<dyn Connectivity>,
    /// Held while refreshing so concurrent cold reads share one fetch.
    refresh_lock: Mutex<()>,
}

impl ExchangeRateCache {
    pub fn new(
        api: ApiClient,
        endpoint: &str,
        flags: Arc<FlagStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            api,
            endpoint: endpoint.to_string(),
            flags,
            connectivity,
            refresh_lock: Mutex::new(()),
        }
    }

    /// The persisted rate, if present and valid.
    pub fn cached(&self) -> Option<CachedExchangeRate> {
        let raw = match self.flags.get(EXCHANGE_RATE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read cached exchange rate");
                return None;
            }
        };
        match serde_json::from_str::<CachedExchangeRate>(&raw) {
            Ok(cached) if cached.rate.is_finite() && cached.rate > 0.0 => Some(cached),
            Ok(cached) => {
                debug!(rate = cached.rate, "Ignoring non-positive cached rate");
                None
            }
            Err(e) => {
                debug!(error = %e, "Ignoring malformed cached exchange rate");
                None
            }
        }
    }

    fn store(&self, rate: f64, now: DateTime<Utc>) {
        let cached = CachedExchangeRate {
            rate,
            timestamp: now.timestamp_millis(),
            is_offline: false,
        };
        let result = serde_json::to_string(&cached)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.flags
                    .set(EXCHANGE_RATE_KEY, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist exchange rate");
        }
    }

    pub async fn get_rate(&self) -> RateQuote {
        let online = self.connectivity.is_online();
        let mut cached = self.cached();

        if online && cached.map_or(true, |c| is_expired(&c, Utc::now())) {
            let _guard = self.refresh_lock.lock().await;
            // Another caller may have refreshed while this one waited
            cached = self.cached();
            if cached.map_or(true, |c| is_expired(&c, Utc::now())) {
                match self.api.fetch_jpy_rate(&self.endpoint).await {
                    Ok(rate) => {
                        let now = Utc::now();
                        self.store(rate, now);
                        info!(rate, "Exchange rate refreshed");
                        return RateQuote {
                            rate,
                            last_updated: Some(now),
                            is_offline: false,
                            is_fallback: false,
                        };
                    }
                    Err(e) => warn!(error = %e, "Exchange rate refresh failed"),
                }
            }
        }

        match cached {
            Some(c) => RateQuote {
                rate: c.rate,
                last_updated: c.fetched_at(),
                is_offline: !online || is_expired(&c, Utc::now()),
                is_fallback: false,
            },
            None => {
                debug!("No exchange rate available, using fallback");
                RateQuote {
                    rate: FALLBACK_RATE,
                    last_updated: None,
                    is_offline: true,
                    is_fallback: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{NetworkMonitor, NetworkStatus};
    use crate::store::MemoryBackend;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rate_cache(endpoint: &str, status: NetworkStatus) -> (ExchangeRateCache, Arc<FlagStore>) {
        let flags = Arc::new(FlagStore::new(Arc::new(MemoryBackend::new())));
        let cache = ExchangeRateCache::new(
            ApiClient::new().unwrap(),
            endpoint,
            Arc::clone(&flags),
            Arc::new(NetworkMonitor::new(status)),
        );
        (cache, flags)
    }

    fn seed(flags: &FlagStore, rate: f64, age: Duration) {
        let cached = CachedExchangeRate {
            rate,
            timestamp: (Utc::now() - age).timestamp_millis(),
            is_offline: false,
        };
        flags
            .set(EXCHANGE_RATE_KEY, &serde_json::to_string(&cached).unwrap())
            .unwrap();
    }

    async fn rate_server(rate: f64, expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base": "USD",
                "rates": {"JPY": rate}
            })))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let server = rate_server(151.2, 0).await;
        let (cache, flags) = rate_cache(&format!("{}/latest", server.uri()), NetworkStatus::Online);
        seed(&flags, 148.5, Duration::hours(23));

        let quote = cache.get_rate().await;
        assert_eq!(quote.rate, 148.5);
        assert!(!quote.is_offline);
        assert!(!quote.is_fallback);
    }

    #[tokio::test]
    async fn test_expired_cache_is_refreshed_and_overwritten() {
        let server = rate_server(151.2, 1).await;
        let (cache, flags) = rate_cache(&format!("{}/latest", server.uri()), NetworkStatus::Online);
        seed(&flags, 148.5, Duration::hours(25));

        let quote = cache.get_rate().await;
        assert_eq!(quote.rate, 151.2);
        assert!(!quote.is_offline);
        assert!(!quote.is_fallback);

        let stored = cache.cached().unwrap();
        assert_eq!(stored.rate, 151.2);
        assert!(Utc::now().timestamp_millis() - stored.timestamp < 60_000);
    }

    #[tokio::test]
    async fn test_no_cache_offline_uses_fallback() {
        let (cache, _) = rate_cache("http://127.0.0.1:9/latest", NetworkStatus::Offline);
        let quote = cache.get_rate().await;
        assert_eq!(quote.rate, FALLBACK_RATE);
        assert!(quote.is_fallback);
        assert!(quote.is_offline);
        assert_eq!(quote.last_updated, None);
    }

    #[tokio::test]
    async fn test_offline_serves_stale_cache() {
        let (cache, flags) = rate_cache("http://127.0.0.1:9/latest", NetworkStatus::Offline);
        seed(&flags, 149.0, Duration::hours(72));
        let quote = cache.get_rate().await;
        assert_eq!(quote.rate, 149.0);
        assert!(quote.is_offline);
        assert!(!quote.is_fallback);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_stale_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let (cache, flags) = rate_cache(&format!("{}/latest", server.uri()), NetworkStatus::Online);
        seed(&flags, 149.0, Duration::hours(30));

        let quote = cache.get_rate().await;
        assert_eq!(quote.rate, 149.0);
        assert!(quote.is_offline);
        assert!(!quote.is_fallback);
    }

    #[tokio::test]
    async fn test_invalid_remote_rate_is_a_failed_fetch() {
        let server = rate_server(0.0, 1).await;
        let (cache, _) = rate_cache(&format!("{}/latest", server.uri()), NetworkStatus::Online);
        let quote = cache.get_rate().await;
        assert!(quote.is_fallback);
        assert!(cache.cached().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_cold_reads_share_one_fetch() {
        let server = rate_server(151.2, 1).await;
        let (cache, _) = rate_cache(&format!("{}/latest", server.uri()), NetworkStatus::Online);
        let (a, b, c) = tokio::join!(cache.get_rate(), cache.get_rate(), cache.get_rate());
        assert_eq!(a.rate, 151.2);
        assert_eq!(b.rate, 151.2);
        assert_eq!(c.rate, 151.2);
    }

    #[test]
    fn test_conversions_round() {
        assert_eq!(usd_to_jpy(10.0, 151.26), 1513);
        assert_eq!(usd_to_jpy(0.0, 151.26), 0);
        assert_eq!(jpy_to_usd(1000.0, 151.2), 6.61);
        assert_eq!(jpy_to_usd(1500.0, 150.0), 10.0);
    }

    #[test]
    fn test_out_of_range_timestamps_are_expired() {
        let now = Utc::now();
        let at = |timestamp| CachedExchangeRate {
            rate: 150.0,
            timestamp,
            is_offline: false,
        };
        assert!(is_expired(&at(i64::MIN), now));
        assert!(is_expired(&at(i64::MAX), now));
        assert!(is_expired(&at((now + Duration::hours(3)).timestamp_millis()), now));
        assert!(!is_expired(&at((now - Duration::hours(3)).timestamp_millis()), now));
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_refreshed() {
        let server = rate_server(151.2, 1).await;
        let (cache, flags) = rate_cache(&format!("{}/latest", server.uri()), NetworkStatus::Online);
        flags
            .set(
                EXCHANGE_RATE_KEY,
                &format!(r#"{{"rate":148.5,"timestamp":{},"isOffline":false}}"#, i64::MIN),
            )
            .unwrap();

        let quote = cache.get_rate().await;
        assert_eq!(quote.rate, 151.2);
        assert!(!quote.is_fallback);
    }

    #[test]
    fn test_malformed_cache_is_ignored() {
        let (cache, flags) = rate_cache("http://127.0.0.1:9/latest", NetworkStatus::Offline);
        flags.set(EXCHANGE_RATE_KEY, "{not json").unwrap();
        assert!(cache.cached().is_none());
        seed(&flags, -3.0, Duration::hours(1));
        assert!(cache.cached().is_none());
    }
}
