//! File-backed storage.
//!
//! All keys live in a single JSON object. Writes go to a sibling temp file
//! which is then renamed over the original, so a crash mid-write leaves the
//! previous document intact.

use crate::{PersistedStorage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// JSON document store rooted at one file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a storage backed by `path`. The file is created lazily on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StorageResult<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(err) => return Err(err.into()),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(doc) => Ok(doc),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Discarding unreadable storage file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_document(&self, doc: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(doc)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), keys = doc.len(), "Storage file written");
        Ok(())
    }

    fn guard(&self) -> StorageResult<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| StorageError::Backend("file storage lock poisoned".to_string()))
    }
}

impl PersistedStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.guard()?;
        let mut doc = self.read_document()?;
        doc.insert(key.to_string(), value.to_string());
        self.write_document(&doc)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.guard()?;
        Ok(self.read_document()?.remove(key))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.guard()?;
        let mut doc = self.read_document()?;
        if doc.remove(key).is_none() {
            return Ok(false);
        }
        self.write_document(&doc)?;
        Ok(true)
    }
}
