//! Durable client-side key-value storage
//!
//! Every operation is synchronous and total. Backends that can fail (the
//! file-backed store) log the failure and keep serving from memory, so a
//! caller never has to handle a storage error after the store is opened.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::{MdeditError, Result};

/// String key-value capability shared by everything in one client process
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str);

    /// Remove a key; removing an absent key is a no-op
    fn delete(&self, key: &str);

    /// List stored keys in sorted order
    fn keys(&self) -> Vec<String>;
}

/// Process-local store that forgets everything on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

/// Store persisted as a JSON object in a single file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                MdeditError::Storage(format!(
                    "Failed to read storage file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    MdeditError::Storage(format!(
                        "Failed to parse storage file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            "Opened file store {} with {} keys",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) {
        if let Err(e) = self.write_file(entries) {
            tracing::warn!(
                "Failed to persist storage file {}, keeping in-memory state: {}",
                self.path.display(),
                e
            );
        }
    }

    fn write_file(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn delete(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

/// Build the store described by the storage configuration
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    match &config.file {
        Some(path) => {
            tracing::info!("Using durable storage at {}", path.display());
            Ok(Arc::new(FileStore::open(path.clone())?))
        }
        None => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_basic_operations() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a"), None);

        store.set("a", "1");
        store.set("a", "2");
        assert_eq!(store.get("a"), Some("2".to_string()));

        store.delete("a");
        store.delete("a");
        assert_eq!(store.get("a"), None);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("admin_token_doc1", "T1");
            store.set("theme", "dark");
            store.delete("theme");
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("admin_token_doc1"), Some("T1".to_string()));
        assert_eq!(reopened.keys(), vec!["admin_token_doc1".to_string()]);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, MdeditError::Storage(_)));
    }

    #[test]
    fn test_file_store_keeps_memory_when_persist_fails() {
        let dir = tempdir().unwrap();
        // A directory in place of the file makes every write fail
        let path = dir.path().join("blocked");
        std::fs::create_dir_all(path.with_extension("tmp")).unwrap();

        let store = FileStore::open(&path).unwrap();
        store.set("k", "v");
        assert_eq!(store.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_open_store_from_config() {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            file: Some(dir.path().join("s.json")),
            ..StorageConfig::default()
        };

        let store = open_store(&config).unwrap();
        store.set("x", "y");
        assert!(dir.path().join("s.json").exists());

        let memory = open_store(&StorageConfig::default()).unwrap();
        assert_eq!(memory.get("x"), None);
    }
}
