//! Cache of assistant replies.
//!
//! Only the data contract lives here: replies are stored by normalized
//! query and expire after a week. Prompt construction belongs to the app.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::models::AiCacheEntry;
use crate::store::LocalStore;

/// Replies older than this are treated as misses.
const AI_CACHE_TTL_DAYS: i64 = 7;

pub struct AiResponseCache {
    store: Arc<LocalStore>,
}

/// Cache key for a query: lowercased with whitespace collapsed.
pub fn query_key(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl AiResponseCache {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, query: &str) -> Option<String> {
        let key = query_key(query);
        let entry = match self.store.get::<AiCacheEntry>(&key) {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(error = %e, "Failed to read AI cache");
                return None;
            }
        };
        if Utc::now() - entry.created_at > Duration::days(AI_CACHE_TTL_DAYS) {
            debug!(key = %key, "AI cache entry expired");
            return None;
        }
        Some(entry.response)
    }

    /// Store a reply. Failures are logged; the cache is best-effort.
    pub fn put(&self, query: &str, response: &str) {
        let entry = AiCacheEntry {
            id: query_key(query),
            query: query.to_string(),
            response: response.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.put(&entry) {
            warn!(error = %e, "Failed to write AI cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    fn cache() -> (AiResponseCache, Arc<LocalStore>) {
        let store = Arc::new(LocalStore::open(Arc::new(MemoryBackend::new())));
        (AiResponseCache::new(Arc::clone(&store)), store)
    }

    #[test]
    fn test_query_key_normalizes() {
        assert_eq!(query_key("  How do I  say THANK you? "), "how do i say thank you?");
    }

    #[test]
    fn test_put_then_get_with_equivalent_query() {
        let (cache, _) = cache();
        assert!(cache.get("Where is the JR office?").is_none());
        cache.put("Where is the JR office?", "Next to the Marunouchi exit.");
        assert_eq!(
            cache.get("where is  the jr office?").as_deref(),
            Some("Next to the Marunouchi exit.")
        );
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let (cache, store) = cache();
        store
            .put(&AiCacheEntry {
                id: query_key("old question"),
                query: "old question".to_string(),
                response: "old answer".to_string(),
                created_at: Utc::now() - Duration::days(8),
            })
            .unwrap();
        assert!(cache.get("old question").is_none());
    }
}
