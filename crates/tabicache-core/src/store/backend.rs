//! Storage backends for the local store.
//!
//! A backend stores opaque JSON documents by name. Each write replaces the
//! whole document, which gives atomic per-collection writes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use super::StoreError;

pub trait Backend: Send + Sync {
    /// Read a document, `None` if it was never written.
    fn read(&self, name: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, name: &str, contents: &str) -> Result<(), StoreError>;

    /// Remove a document. Removing a missing document is not an error.
    fn remove(&self, name: &str) -> Result<(), StoreError>;
}

/// One pretty-printed JSON file per document under a directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io("data directory", e))?;
        Ok(Self { dir })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl Backend for FileBackend {
    fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StoreError::io(name, e))
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), StoreError> {
        // Write to a sibling temp file and rename so readers never see a torn file
        let path = self.path(name);
        let tmp = self.dir.join(format!("{}.json.tmp", name));
        std::fs::write(&tmp, contents).map_err(|e| StoreError::io(name, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(name, e))
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path(name);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| StoreError::io(name, e))?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    docs: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        let docs = self
            .docs
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))?;
        Ok(docs.get(name).cloned())
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), StoreError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))?;
        docs.insert(name.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))?;
        docs.remove(name);
        Ok(())
    }
}
