use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::connectivity::Connectivity;
use crate::models::{Accommodation, Activity, Restaurant};
use crate::store::flags::LAST_CACHE_WARM_KEY;
use crate::store::{FlagStore, LocalStore, Record};

// ============================================================================
// Constants
// ============================================================================

/// Pages fetched concurrently per batch.
pub const WARM_BATCH_SIZE: usize = 5;

/// Pause between batches.
const DEFAULT_BATCH_DELAY_MS: u64 = 100;

/// Minimum time between two warm runs.
const WARM_INTERVAL_MINUTES: i64 = 60;

/// Top-level routes that exist regardless of trip data.
const STATIC_ROUTES: &[&str] = &[
    "/",
    "/schedule",
    "/reservations",
    "/map",
    "/phrases",
    "/chat",
    "/checklist",
    "/alerts",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CohortCount {
    pub cached: usize,
    pub total: usize,
}

impl CohortCount {
    fn merge(self, other: CohortCount) -> CohortCount {
        CohortCount {
            cached: self.cached + other.cached,
            total: self.total + other.total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    pub static_pages: CohortCount,
    pub detail_pages: CohortCount,
    pub restaurant_pages: CohortCount,
    /// Restaurants skipped because their assignment payload did not decode.
    pub quarantined: usize,
}

impl WarmReport {
    pub fn overall(&self) -> CohortCount {
        self.static_pages
            .merge(self.detail_pages)
            .merge(self.restaurant_pages)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmOutcome {
    SkippedOffline,
    SkippedRecent { last_warmed: DateTime<Utc> },
    Completed(WarmReport),
}

/// Requests every known app page in small batches so the offline page
/// cache fills up. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct CacheWarmer {
    api: ApiClient,
    base_url: Arc<str>,
    store: Arc<LocalStore>,
    flags: Arc<FlagStore>,
    connectivity: Arc<dyn Connectivity>,
    batch_delay: Duration,
}

impl CacheWarmer {
    pub fn new(
        api: ApiClient,
        base_url: &str,
        store: Arc<LocalStore>,
        flags: Arc<FlagStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            api,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            store,
            flags,
            connectivity,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
        }
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Time of the last completed warm run, if recorded and readable.
    pub fn last_warmed(&self) -> Option<DateTime<Utc>> {
        let raw = match self.flags.get(LAST_CACHE_WARM_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read last cache warm time");
                return None;
            }
        };
        let parsed = raw.trim().parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
        if parsed.is_none() {
            debug!(value = %raw, "Ignoring unparseable last cache warm time");
        }
        parsed
    }

    fn record_warmed(&self) {
        let now = Utc::now().timestamp_millis().to_string();
        if let Err(e) = self.flags.set(LAST_CACHE_WARM_KEY, &now) {
            warn!(error = %e, "Failed to record cache warm time");
        }
    }

    /// Warm all cohorts unless offline or warmed within the last hour.
    /// Never fails: fetch and storage errors only lower the counts.
    pub async fn warm_all_caches(&self) -> WarmOutcome {
        if !self.connectivity.is_online() {
            debug!("Offline, skipping cache warm");
            return WarmOutcome::SkippedOffline;
        }
        if let Some(last_warmed) = self.last_warmed() {
            let age = Utc::now() - last_warmed;
            if age < chrono::Duration::zero() {
                // Clock skew or a restored profile; treat as stale
                debug!(last_warmed = %last_warmed, "Last cache warm is in the future, ignoring");
            } else if age < chrono::Duration::minutes(WARM_INTERVAL_MINUTES) {
                debug!(last_warmed = %last_warmed, "Cache warmed recently, skipping");
                return WarmOutcome::SkippedRecent { last_warmed };
            }
        }

        info!("Warming offline page cache");
        let static_pages = self.warm_static_pages().await;
        let detail_pages = self.warm_detail_pages().await;
        let (restaurant_pages, quarantined) = self.warm_restaurants().await;

        self.record_warmed();

        let report = WarmReport {
            static_pages,
            detail_pages,
            restaurant_pages,
            quarantined,
        };
        let overall = report.overall();
        info!(
            cached = overall.cached,
            total = overall.total,
            quarantined,
            "Cache warm complete"
        );
        WarmOutcome::Completed(report)
    }

    pub async fn warm_static_pages(&self) -> CohortCount {
        let urls: Vec<String> = STATIC_ROUTES.iter().map(|r| self.url(r)).collect();
        self.warm_urls(&urls).await
    }

    /// One page per activity and per accommodation.
    pub async fn warm_detail_pages(&self) -> CohortCount {
        let mut urls: Vec<String> = self
            .load_all::<Activity>()
            .iter()
            .map(|a| self.url(&format!("/activity/{}", a.id)))
            .collect();
        urls.extend(
            self.load_all::<Accommodation>()
                .iter()
                .map(|s| self.url(&format!("/stay/{}", s.id))),
        );
        self.warm_urls(&urls).await
    }

    /// One page per restaurant and assigned date.
    pub async fn warm_restaurant_pages(&self) -> CohortCount {
        self.warm_restaurants().await.0
    }

    async fn warm_restaurants(&self) -> (CohortCount, usize) {
        let (urls, quarantined) = self.restaurant_urls();
        (self.warm_urls(&urls).await, quarantined)
    }

    fn restaurant_urls(&self) -> (Vec<String>, usize) {
        let mut urls = Vec::new();
        let mut quarantined = 0;
        for restaurant in self.load_all::<Restaurant>() {
            let assignments = match restaurant.assignments() {
                Ok(assignments) => assignments,
                Err(e) => {
                    warn!(restaurant = %restaurant.id, error = %e, "Skipping restaurant with bad assignments");
                    quarantined += 1;
                    continue;
                }
            };
            let dates: BTreeSet<_> = assignments.iter().map(|a| a.date).collect();
            urls.extend(
                dates
                    .into_iter()
                    .map(|date| self.url(&format!("/restaurants/{}/{}", restaurant.id, date))),
            );
        }
        (urls, quarantined)
    }

    fn load_all<T: Record>(&self) -> Vec<T> {
        self.store.get_all::<T>().unwrap_or_else(|e| {
            warn!(collection = T::COLLECTION.name(), error = %e, "Failed to read records for cache warm");
            Vec::new()
        })
    }

    /// Fetch `urls` in batches of [`WARM_BATCH_SIZE`], pausing between batches.
    async fn warm_urls(&self, urls: &[String]) -> CohortCount {
        let mut cached = 0;
        for (index, batch) in urls.chunks(WARM_BATCH_SIZE).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            let results = join_all(batch.iter().map(|url| async move {
                (url, self.api.fetch_page(url).await)
            }))
            .await;
            for (url, result) in results {
                match result {
                    Ok(()) => cached += 1,
                    Err(e) => debug!(url = %url, error = %e, "Page not cached"),
                }
            }
        }
        CohortCount {
            cached,
            total: urls.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{NetworkMonitor, NetworkStatus};
    use crate::store::MemoryBackend;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        warmer: CacheWarmer,
        store: Arc<LocalStore>,
        flags: Arc<FlagStore>,
    }

    fn fixture(base_url: &str, status: NetworkStatus) -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(LocalStore::open(backend.clone()));
        let flags = Arc::new(FlagStore::new(backend));
        let warmer = CacheWarmer::new(
            ApiClient::new().unwrap(),
            base_url,
            Arc::clone(&store),
            Arc::clone(&flags),
            Arc::new(NetworkMonitor::new(status)),
        )
        .with_batch_delay(Duration::ZERO);
        Fixture { warmer, store, flags }
    }

    async fn ok_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        server
    }

    fn restaurant(id: &str, assignments: &str) -> Restaurant {
        Restaurant {
            id: id.to_string(),
            name: id.to_string(),
            city: None,
            cuisine: None,
            address: None,
            reservation_time: None,
            meal_assignments: Some(assignments.to_string()),
            selected_meal: None,
        }
    }

    fn activity(id: &str) -> Activity {
        Activity {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            start_time: None,
            end_time: None,
            title: id.to_string(),
            location: None,
            city: None,
            category: None,
            notes: None,
            location_id: None,
            sort_order: 0,
        }
    }

    #[tokio::test]
    async fn test_offline_skips_without_requests() {
        let server = ok_server().await;
        let f = fixture(&server.uri(), NetworkStatus::Offline);
        assert_eq!(f.warmer.warm_all_caches().await, WarmOutcome::SkippedOffline);
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(f.warmer.last_warmed().is_none());
    }

    #[tokio::test]
    async fn test_second_run_within_hour_is_skipped() {
        let server = ok_server().await;
        let f = fixture(&server.uri(), NetworkStatus::Online);
        f.store.put(&activity("a1")).unwrap();

        let first = f.warmer.warm_all_caches().await;
        let report = match first {
            WarmOutcome::Completed(report) => report,
            other => panic!("expected completed warm, got {other:?}"),
        };
        assert_eq!(report.static_pages.total, STATIC_ROUTES.len());
        assert_eq!(report.detail_pages, CohortCount { cached: 1, total: 1 });
        let requests_after_first = server.received_requests().await.unwrap().len();
        assert_eq!(requests_after_first, STATIC_ROUTES.len() + 1);

        assert!(matches!(
            f.warmer.warm_all_caches().await,
            WarmOutcome::SkippedRecent { .. }
        ));
        assert_eq!(server.received_requests().await.unwrap().len(), requests_after_first);
    }

    #[tokio::test]
    async fn test_stale_last_warm_runs_again() {
        let server = ok_server().await;
        let f = fixture(&server.uri(), NetworkStatus::Online);
        let two_hours_ago = (Utc::now() - chrono::Duration::hours(2)).timestamp_millis();
        f.flags.set(LAST_CACHE_WARM_KEY, &two_hours_ago.to_string()).unwrap();

        assert!(matches!(f.warmer.warm_all_caches().await, WarmOutcome::Completed(_)));
        let last = f.warmer.last_warmed().unwrap();
        assert!(Utc::now() - last < chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_future_last_warm_runs_again() {
        let server = ok_server().await;
        let f = fixture(&server.uri(), NetworkStatus::Online);
        let in_two_hours = (Utc::now() + chrono::Duration::hours(2)).timestamp_millis();
        f.flags.set(LAST_CACHE_WARM_KEY, &in_two_hours.to_string()).unwrap();

        assert!(matches!(f.warmer.warm_all_caches().await, WarmOutcome::Completed(_)));
        assert!(f.warmer.last_warmed().unwrap() <= Utc::now());
    }

    #[tokio::test]
    async fn test_unparseable_last_warm_is_ignored() {
        let server = ok_server().await;
        let f = fixture(&server.uri(), NetworkStatus::Online);
        f.flags.set(LAST_CACHE_WARM_KEY, "yesterday").unwrap();
        assert!(matches!(f.warmer.warm_all_caches().await, WarmOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_failed_fetches_are_counted_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/(map|chat)$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let f = fixture(&server.uri(), NetworkStatus::Online);
        let count = f.warmer.warm_static_pages().await;
        assert_eq!(count.total, STATIC_ROUTES.len());
        assert_eq!(count.cached, STATIC_ROUTES.len() - 2);
    }

    #[tokio::test]
    async fn test_timestamp_recorded_even_when_all_fetches_fail() {
        // Nothing listens on the discard port
        let f = fixture("http://127.0.0.1:9", NetworkStatus::Online);
        match f.warmer.warm_all_caches().await {
            WarmOutcome::Completed(report) => {
                assert_eq!(report.overall().cached, 0);
                assert_eq!(report.overall().total, STATIC_ROUTES.len());
            }
            other => panic!("expected completed warm, got {other:?}"),
        }
        assert!(f.warmer.last_warmed().is_some());
    }

    #[tokio::test]
    async fn test_restaurant_with_malformed_assignments_is_skipped() {
        let server = ok_server().await;
        let f = fixture(&server.uri(), NetworkStatus::Online);
        f.store.put(&restaurant("r-bad", "[{\"date\": ")).unwrap();

        let count = f.warmer.warm_restaurant_pages().await;
        assert_eq!(count, CohortCount { cached: 0, total: 0 });
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_sibling_restaurant_still_warmed() {
        let server = ok_server().await;
        let f = fixture(&server.uri(), NetworkStatus::Online);
        f.store
            .put_all(&[
                restaurant("r-bad", "not json"),
                restaurant(
                    "r-good",
                    r#"[{"date":"2025-03-21","meal":"lunch"},{"date":"2025-03-21","meal":"dinner"},{"date":"2025-03-22"}]"#,
                ),
            ])
            .unwrap();

        let count = f.warmer.warm_restaurant_pages().await;
        assert_eq!(count, CohortCount { cached: 2, total: 2 });

        let requests = server.received_requests().await.unwrap();
        let mut paths: Vec<_> = requests.iter().map(|r| r.url.path().to_string()).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec!["/restaurants/r-good/2025-03-21", "/restaurants/r-good/2025-03-22"]
        );
    }

    #[tokio::test]
    async fn test_batches_cover_every_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/activity/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(12)
            .mount(&server)
            .await;

        let f = fixture(&server.uri(), NetworkStatus::Online);
        let activities: Vec<_> = (0..12).map(|i| activity(&format!("a{i}"))).collect();
        f.store.put_all(&activities).unwrap();

        let count = f.warmer.warm_detail_pages().await;
        assert_eq!(count, CohortCount { cached: 12, total: 12 });
    }
}
