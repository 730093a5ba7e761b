use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::connectivity::Connectivity;
use crate::models::TourContent;
use crate::store::{LocalStore, StoreError};

const BUNDLED_TOUR_CONTENT: &str = include_str!("../../data/tour_content.json");

/// Categories for which free-text labels are matched against guide content.
const LABEL_CATEGORIES: &[&str] = &[
    "temple",
    "shrine",
    "sightseeing",
    "attraction",
    "landmark",
    "museum",
    "park",
    "castle",
];

/// Suffixes tried on and off a normalized label.
const LABEL_SUFFIXES: &[&str] = &["-temple", "-shrine"];

/// Read-only guide content shipped with the app, keyed by `location_id`.
#[derive(Debug, Default, Clone)]
pub struct StaticContent {
    entries: HashMap<String, TourContent>,
}

impl StaticContent {
    pub fn bundled() -> Result<Self, StoreError> {
        let entries: Vec<TourContent> =
            serde_json::from_str(BUNDLED_TOUR_CONTENT).map_err(|source| StoreError::Decode {
                name: "tour_content".to_string(),
                source,
            })?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<TourContent>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.location_id.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, location_id: &str) -> Option<&TourContent> {
        self.entries.get(location_id)
    }

    pub fn contains(&self, location_id: &str) -> bool {
        self.entries.contains_key(location_id)
    }
}

/// Lowercase, drop everything but ASCII letters, digits, whitespace and
/// hyphens, then join the words with single hyphens.
///
/// `"Senso-ji Temple"` becomes `"senso-ji-temple"`.
pub fn normalize_label(label: &str) -> String {
    let cleaned: String = label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Resolves guide content for a location: bundled content wins, then
/// generated content previously saved in the local store.
///
/// A miss returns `None`. Callers decide whether to generate content
/// (see [`ContentResolver::needs_generation`]) or give up.
pub struct ContentResolver {
    statics: StaticContent,
    store: Arc<LocalStore>,
    connectivity: Arc<dyn Connectivity>,
}

impl ContentResolver {
    pub fn new(
        statics: StaticContent,
        store: Arc<LocalStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            statics,
            store,
            connectivity,
        }
    }

    /// Stored dynamic content; read failures count as a miss.
    fn dynamic(&self, location_id: &str) -> Option<TourContent> {
        match self.store.get::<TourContent>(location_id) {
            Ok(found) => found,
            Err(e) => {
                warn!(location_id, error = %e, "Failed to read dynamic tour content");
                None
            }
        }
    }

    pub fn fetch_content(&self, location_id: &str) -> Option<TourContent> {
        if let Some(content) = self.statics.get(location_id) {
            return Some(content.clone());
        }
        let found = self.dynamic(location_id);
        if found.is_none() {
            debug!(location_id, "No tour content found");
        }
        found
    }

    /// Upsert generated content under `location_id`. Bundled content is
    /// never modified; it keeps winning in [`ContentResolver::fetch_content`].
    pub fn save_dynamic_content(
        &self,
        location_id: &str,
        mut content: TourContent,
    ) -> Result<(), StoreError> {
        content.location_id = location_id.to_string();
        self.store.put(&content)?;
        debug!(location_id, "Saved dynamic tour content");
        Ok(())
    }

    pub fn has_content(&self, location_id: &str) -> bool {
        self.statics.contains(location_id) || self.dynamic(location_id).is_some()
    }

    /// True when nothing is cached for the location and the network is up,
    /// i.e. the caller may try to generate content now.
    pub fn needs_generation(&self, location_id: &str) -> bool {
        !self.has_content(location_id) && self.connectivity.is_online()
    }

    /// Match a free-text label (e.g. an activity title) to a bundled
    /// content key. Only labels in sightseeing-like categories are considered.
    pub fn resolve_location_id_for_label(&self, label: &str, category: &str) -> Option<String> {
        let category = category.trim().to_lowercase();
        if !LABEL_CATEGORIES.contains(&category.as_str()) {
            return None;
        }

        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return None;
        }

        let mut candidates = vec![normalized.clone()];
        for suffix in LABEL_SUFFIXES {
            match normalized.strip_suffix(suffix) {
                Some(base) if !base.is_empty() => candidates.push(base.to_string()),
                Some(_) => {}
                None => candidates.push(format!("{}{}", normalized, suffix)),
            }
        }

        candidates.into_iter().find(|c| self.statics.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{NetworkMonitor, NetworkStatus};
    use crate::store::{Backend, MemoryBackend};

    fn content(location_id: &str, title: &str) -> TourContent {
        TourContent {
            id: format!("id-{}", location_id),
            location_id: location_id.to_string(),
            title: title.to_string(),
            title_japanese: None,
            content: format!("About {}", title),
            content_type: Some("temple".to_string()),
            city: Some("Tokyo".to_string()),
            highlights: vec![],
            etiquette_tips: vec![],
        }
    }

    fn resolver_with(statics: Vec<TourContent>, status: NetworkStatus) -> ContentResolver {
        ContentResolver::new(
            StaticContent::from_entries(statics),
            Arc::new(LocalStore::open(Arc::new(MemoryBackend::new()))),
            Arc::new(NetworkMonitor::new(status)),
        )
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Senso-ji Temple"), "senso-ji-temple");
        assert_eq!(normalize_label("  Kiyomizu-dera   (Kyoto)! "), "kiyomizu-dera-kyoto");
        assert_eq!(normalize_label("Tōdai-ji"), "tdai-ji");
        assert_eq!(normalize_label("!!!"), "");
    }

    #[test]
    fn test_static_content_wins_over_dynamic() {
        let resolver = resolver_with(vec![content("senso-ji-temple", "Static")], NetworkStatus::Online);
        resolver
            .save_dynamic_content("senso-ji-temple", content("senso-ji-temple", "Dynamic"))
            .unwrap();
        assert_eq!(resolver.fetch_content("senso-ji-temple").unwrap().title, "Static");
    }

    #[test]
    fn test_saved_dynamic_content_is_returned() {
        let resolver = resolver_with(vec![], NetworkStatus::Online);
        assert!(resolver.fetch_content("nezu-shrine").is_none());
        assert!(!resolver.has_content("nezu-shrine"));

        resolver
            .save_dynamic_content("nezu-shrine", content("ignored-key", "Nezu"))
            .unwrap();
        let found = resolver.fetch_content("nezu-shrine").unwrap();
        assert_eq!(found.title, "Nezu");
        assert_eq!(found.location_id, "nezu-shrine");
        assert!(resolver.has_content("nezu-shrine"));

        // Upsert replaces the previous dynamic entry
        resolver
            .save_dynamic_content("nezu-shrine", content("nezu-shrine", "Nezu Jinja"))
            .unwrap();
        assert_eq!(resolver.fetch_content("nezu-shrine").unwrap().title, "Nezu Jinja");
    }

    #[test]
    fn test_needs_generation_requires_network() {
        let online = resolver_with(vec![], NetworkStatus::Online);
        assert!(online.needs_generation("nezu-shrine"));

        let offline = resolver_with(vec![], NetworkStatus::Offline);
        assert!(!offline.needs_generation("nezu-shrine"));

        let cached = resolver_with(vec![content("nezu-shrine", "Nezu")], NetworkStatus::Online);
        assert!(!cached.needs_generation("nezu-shrine"));
    }

    struct BrokenBackend;

    impl Backend for BrokenBackend {
        fn read(&self, _name: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("unreadable".to_string()))
        }

        fn write(&self, _name: &str, _contents: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("unwritable".to_string()))
        }

        fn remove(&self, _name: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_read_failures_are_misses() {
        let resolver = ContentResolver::new(
            StaticContent::from_entries(vec![content("todai-ji", "Todai-ji")]),
            Arc::new(LocalStore::open(Arc::new(BrokenBackend))),
            Arc::new(NetworkMonitor::default()),
        );
        assert!(resolver.fetch_content("nezu-shrine").is_none());
        assert!(!resolver.has_content("nezu-shrine"));
        assert!(resolver.has_content("todai-ji"));
    }

    #[test]
    fn test_resolve_label_direct_match() {
        let resolver = resolver_with(vec![content("senso-ji-temple", "Senso-ji")], NetworkStatus::Online);
        assert_eq!(
            resolver.resolve_location_id_for_label("Senso-ji Temple", "temple").as_deref(),
            Some("senso-ji-temple")
        );
        assert_eq!(
            resolver.resolve_location_id_for_label("Senso-ji", "Temple").as_deref(),
            Some("senso-ji-temple")
        );
    }

    #[test]
    fn test_resolve_label_suffix_variants() {
        let resolver = resolver_with(
            vec![content("meiji-jingu-shrine", "Meiji"), content("todai-ji", "Todai-ji")],
            NetworkStatus::Online,
        );
        assert_eq!(
            resolver.resolve_location_id_for_label("Meiji Jingu", "shrine").as_deref(),
            Some("meiji-jingu-shrine")
        );
        assert_eq!(
            resolver.resolve_location_id_for_label("Todai-ji Temple", "temple").as_deref(),
            Some("todai-ji")
        );
        assert_eq!(resolver.resolve_location_id_for_label("Nezu Shrine", "shrine"), None);
    }

    #[test]
    fn test_resolve_label_ignores_other_categories() {
        let resolver = resolver_with(vec![content("senso-ji-temple", "Senso-ji")], NetworkStatus::Online);
        assert_eq!(resolver.resolve_location_id_for_label("Senso-ji Temple", "transit"), None);
        assert_eq!(resolver.resolve_location_id_for_label("Senso-ji Temple", "restaurant"), None);
    }

    #[test]
    fn test_bundled_content_loads() {
        let statics = StaticContent::bundled().expect("bundled tour content");
        assert!(statics.contains("senso-ji-temple"));
        assert!(statics.contains("todai-ji"));
    }
}
