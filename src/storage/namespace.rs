//! Key prefixing and the startup cleanup policy

use tracing::{debug, info};

use super::KeyValueTier;
use crate::error::StorageError;

pub const DEFAULT_NAMESPACE: &str = "pointsapp_";

/// Unprefixed keys that survive startup cleanup and are restored from the
/// mirror during reconciliation.
pub const PERSISTENT_KEYS: [&str; 4] = [
    "auth_credentials",
    "users",
    "point-storage",
    "withdrawal-storage",
];

/// Persistence class of an unprefixed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceClass {
    Persistent,
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceGuard {
    prefix: String,
}

impl NamespaceGuard {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn namespace(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Inverse of [`namespace`](Self::namespace). `None` for foreign keys.
    pub fn strip<'a>(&self, prefixed: &'a str) -> Option<&'a str> {
        prefixed.strip_prefix(self.prefix.as_str())
    }

    pub fn is_persistent(&self, key: &str) -> bool {
        PERSISTENT_KEYS.contains(&key)
    }

    pub fn classify(&self, key: &str) -> PersistenceClass {
        if self.is_persistent(key) {
            PersistenceClass::Persistent
        } else {
            PersistenceClass::Ephemeral
        }
    }

    /// Delete every namespaced Ephemeral key from `primary`.
    ///
    /// Returns how many keys were removed; a second run removes nothing.
    pub fn purge_non_persistent(&self, primary: &dyn KeyValueTier) -> Result<usize, StorageError> {
        let mut removed = 0;
        for key in primary.keys()? {
            let Some(bare) = self.strip(&key) else {
                continue;
            };
            if self.classify(bare) == PersistenceClass::Persistent {
                continue;
            }
            debug!("Purging ephemeral key '{}'", bare);
            primary.delete(&key)?;
            removed += 1;
        }
        if removed > 0 {
            info!("Startup cleanup removed {} ephemeral key(s)", removed);
        }
        Ok(removed)
    }
}

impl Default for NamespaceGuard {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
