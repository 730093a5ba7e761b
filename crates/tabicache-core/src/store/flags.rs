//! Small persisted string flags, one document for all keys.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{Backend, StoreError};

const FLAGS_DOCUMENT: &str = "flags";

/// Key holding the epoch-ms time of the last cache warm.
pub const LAST_CACHE_WARM_KEY: &str = "tabicache.lastCacheWarm";

/// Key holding the JSON-encoded cached exchange rate.
pub const EXCHANGE_RATE_KEY: &str = "tabicache.exchangeRate";

/// Closes together with the local store; a closed flag store rejects
/// reads and writes with [`StoreError::Closed`].
pub struct FlagStore {
    backend: Arc<dyn Backend>,
    open: AtomicBool,
    write_lock: Mutex<()>,
}

impl FlagStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            open: AtomicBool::new(true),
            write_lock: Mutex::new(()),
        }
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Flag store closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.is_open() {
            return Err(StoreError::Closed);
        }
        match self.backend.read(FLAGS_DOCUMENT)? {
            None => Ok(BTreeMap::new()),
            Some(contents) => serde_json::from_str(&contents).map_err(|source| StoreError::Decode {
                name: FLAGS_DOCUMENT.to_string(),
                source,
            }),
        }
    }

    fn save(&self, flags: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(flags).map_err(|source| StoreError::Encode {
            name: FLAGS_DOCUMENT.to_string(),
            source,
        })?;
        self.backend.write(FLAGS_DOCUMENT, &contents)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut flags = self.load()?;
        flags.insert(key.to_string(), value.to_string());
        self.save(&flags)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut flags = self.load()?;
        if flags.remove(key).is_some() {
            self.save(&flags)?;
        }
        Ok(())
    }
}
