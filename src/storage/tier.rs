//! Concrete storage tiers

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::KeyValueTier;
use crate::error::StorageError;

/// In-memory tier with an optional byte quota.
///
/// The quota counts key and value bytes of every entry. A tier can also be
/// switched off to simulate disabled storage.
pub struct MemoryTier {
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
    available: AtomicBool,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: None,
            available: AtomicBool::new(true),
        }
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota: Some(quota_bytes),
            ..Self::new()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::TierUnavailable("memory tier disabled".to_string()))
        }
    }

    fn poisoned() -> StorageError {
        StorageError::TierUnavailable("memory tier lock poisoned".to_string())
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueTier for MemoryTier {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;

        if let Some(limit) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.keys().cloned().collect())
    }
}

/// Durable tier backed by a sled database.
pub struct SledTier {
    db: sled::Db,
}

impl SledTier {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| StorageError::TierUnavailable(e.to_string()))?;
        Ok(Self { db })
    }

    /// A database that is removed when dropped.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StorageError::TierUnavailable(e.to_string()))?;
        Ok(Self { db })
    }
}

impl KeyValueTier for SledTier {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(bytes)) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StorageError::Corrupt(key.to_string())),
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::TierUnavailable(e.to_string())),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map(|_| ())
            .map_err(|e| StorageError::TierUnavailable(e.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.db
            .remove(key.as_bytes())
            .map(|_| ())
            .map_err(|e| StorageError::TierUnavailable(e.to_string()))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for item in self.db.iter().keys() {
            let raw = item.map_err(|e| StorageError::TierUnavailable(e.to_string()))?;
            // Non-UTF-8 keys were not written by us
            if let Ok(key) = String::from_utf8(raw.to_vec()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| StorageError::TierUnavailable(e.to_string()))
    }
}
