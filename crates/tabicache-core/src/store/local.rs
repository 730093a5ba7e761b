use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use super::{Backend, SeedData, StoreError};
use crate::models::{
    Accommodation, Activity, AiCacheEntry, Alert, ChecklistItem, LocationShare, Restaurant,
    SyncMeta, TourContent, TransitSegment,
};

/// Keyed collections held by the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Activities,
    TransitSegments,
    Accommodations,
    Restaurants,
    Alerts,
    LocationShares,
    AiCache,
    ChecklistItems,
    SyncMeta,
    TourContent,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Activities,
        Collection::TransitSegments,
        Collection::Accommodations,
        Collection::Restaurants,
        Collection::Alerts,
        Collection::LocationShares,
        Collection::AiCache,
        Collection::ChecklistItems,
        Collection::SyncMeta,
        Collection::TourContent,
    ];

    /// Local (camelCase) collection name, also the document name on disk.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Activities => "activities",
            Collection::TransitSegments => "transitSegments",
            Collection::Accommodations => "accommodations",
            Collection::Restaurants => "restaurants",
            Collection::Alerts => "alerts",
            Collection::LocationShares => "locationShares",
            Collection::AiCache => "aiCache",
            Collection::ChecklistItems => "checklistItems",
            Collection::SyncMeta => "syncMeta",
            Collection::TourContent => "tourContent",
        }
    }
}

/// An entity stored in one of the keyed collections.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;

    /// Unique key within the collection.
    fn key(&self) -> &str;
}

macro_rules! id_record {
    ($ty:ty, $collection:expr) => {
        impl Record for $ty {
            const COLLECTION: Collection = $collection;

            fn key(&self) -> &str {
                &self.id
            }
        }
    };
}

id_record!(Activity, Collection::Activities);
id_record!(TransitSegment, Collection::TransitSegments);
id_record!(Accommodation, Collection::Accommodations);
id_record!(Restaurant, Collection::Restaurants);
id_record!(Alert, Collection::Alerts);
id_record!(LocationShare, Collection::LocationShares);
id_record!(AiCacheEntry, Collection::AiCache);
id_record!(ChecklistItem, Collection::ChecklistItems);

impl Record for SyncMeta {
    const COLLECTION: Collection = Collection::SyncMeta;

    fn key(&self) -> &str {
        &self.table_name
    }
}

impl Record for TourContent {
    const COLLECTION: Collection = Collection::TourContent;

    fn key(&self) -> &str {
        &self.location_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

/// Human-readable age of a timestamp, e.g. "5m ago", "2h ago", "3d ago".
pub fn age_display(since: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - since).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Keyed entity store over a [`Backend`].
///
/// Each collection is one document holding a map of key to record, so a
/// write to a collection is atomic. Writes are serialized through a single
/// lock; the last write wins.
///
/// The store is opened explicitly and closed with [`LocalStore::close`];
/// every operation on a closed store fails with [`StoreError::Closed`].
pub struct LocalStore {
    backend: Arc<dyn Backend>,
    open: AtomicBool,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn open(backend: Arc<dyn Backend>) -> Self {
        debug!("Local store opened");
        Self {
            backend,
            open: AtomicBool::new(true),
            write_lock: Mutex::new(()),
        }
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Local store closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_collection<T: Record>(&self) -> Result<CachedData<BTreeMap<String, T>>, StoreError> {
        let name = T::COLLECTION.name();
        match self.backend.read(name)? {
            None => Ok(CachedData::new(BTreeMap::new())),
            Some(contents) => serde_json::from_str(&contents).map_err(|source| StoreError::Decode {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn save_collection<T: Record>(&self, records: BTreeMap<String, T>) -> Result<(), StoreError> {
        let name = T::COLLECTION.name();
        let cached = CachedData::new(records);
        let contents = serde_json::to_string_pretty(&cached).map_err(|source| StoreError::Encode {
            name: name.to_string(),
            source,
        })?;
        self.backend.write(name, &contents)
    }

    // ===== Reads =====

    pub fn get<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.ensure_open()?;
        Ok(self.load_collection::<T>()?.data.remove(key))
    }

    pub fn get_all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.ensure_open()?;
        Ok(self.load_collection::<T>()?.data.into_values().collect())
    }

    /// When the collection was last written, if ever.
    pub fn updated_at(&self, collection: Collection) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.ensure_open()?;
        #[derive(Deserialize)]
        struct Header {
            cached_at: DateTime<Utc>,
        }
        let name = collection.name();
        match self.backend.read(name)? {
            None => Ok(None),
            Some(contents) => serde_json::from_str::<Header>(&contents)
                .map(|h| Some(h.cached_at))
                .map_err(|source| StoreError::Decode {
                    name: name.to_string(),
                    source,
                }),
        }
    }

    // ===== Writes =====

    /// Insert or replace a record by key.
    pub fn put<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        self.put_all(std::slice::from_ref(record))
    }

    pub fn put_all<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _guard = self.lock_writes();
        let mut map = self.load_collection::<T>()?.data;
        for record in records {
            map.insert(record.key().to_string(), record.clone());
        }
        self.save_collection(map)
    }

    /// Replace the whole collection with `records`.
    pub fn replace_all<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _guard = self.lock_writes();
        let map = records
            .iter()
            .map(|r| (r.key().to_string(), r.clone()))
            .collect();
        self.save_collection(map)
    }

    /// Read-modify-write a single record under the write lock.
    /// Returns the updated record, or `None` if the key is absent.
    pub fn update<T: Record>(
        &self,
        key: &str,
        apply: impl FnOnce(&mut T),
    ) -> Result<Option<T>, StoreError> {
        self.ensure_open()?;
        let _guard = self.lock_writes();
        let mut map = self.load_collection::<T>()?.data;
        let updated = match map.get_mut(key) {
            Some(record) => {
                apply(record);
                record.clone()
            }
            None => return Ok(None),
        };
        self.save_collection(map)?;
        Ok(Some(updated))
    }

    pub fn delete_all(&self, collection: Collection) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _guard = self.lock_writes();
        self.backend.remove(collection.name())
    }

    /// Delete every collection and reseed trip entities from the bundled
    /// seed data. Returns the number of seeded records.
    pub fn reset(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let seed = SeedData::bundled()?;
        {
            let _guard = self.lock_writes();
            for collection in Collection::ALL {
                self.backend.remove(collection.name())?;
            }
        }
        let count = seed.apply(self)?;
        info!(records = count, "Local store reset and reseeded");
        Ok(count)
    }

    // ===== User edits =====

    /// Flip a checklist item. Returns the new checked state.
    pub fn toggle_checklist_item(&self, id: &str) -> Result<Option<bool>, StoreError> {
        Ok(self
            .update::<ChecklistItem>(id, |item| item.checked = !item.checked)?
            .map(|item| item.checked))
    }

    /// Record the meal a user picked for a restaurant.
    pub fn select_meal(&self, restaurant_id: &str, meal: Option<String>) -> Result<bool, StoreError> {
        Ok(self
            .update::<Restaurant>(restaurant_id, |r| r.selected_meal = meal)?
            .is_some())
    }
}
