//! The storage service shared by every consumer

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::namespace::NamespaceGuard;
use super::tier::MemoryTier;
use super::{KeyValueTier, TierKind};
use crate::error::StorageError;
use crate::notifier::{ChangeNotifier, ChangeReceiver};

/// Typed access to the two tiers.
///
/// Reads come from the primary tier. Writes land on the primary tier first
/// and are copied to the secondary tier on a best-effort basis. Tier errors
/// stop here: callers see a default value or a `false`.
pub struct KeyStore {
    guard: NamespaceGuard,
    primary: Arc<dyn KeyValueTier>,
    secondary: Arc<dyn KeyValueTier>,
    notifier: ChangeNotifier,
}

impl KeyStore {
    pub fn new(
        guard: NamespaceGuard,
        primary: Arc<dyn KeyValueTier>,
        secondary: Arc<dyn KeyValueTier>,
    ) -> Self {
        Self {
            guard,
            primary,
            secondary,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Both tiers in memory, default namespace.
    pub fn in_memory() -> Self {
        Self::new(
            NamespaceGuard::default(),
            Arc::new(MemoryTier::new()),
            Arc::new(MemoryTier::new()),
        )
    }

    pub fn guard(&self) -> &NamespaceGuard {
        &self.guard
    }

    pub fn tier(&self, kind: TierKind) -> &dyn KeyValueTier {
        match kind {
            TierKind::Primary => self.primary.as_ref(),
            TierKind::Secondary => self.secondary.as_ref(),
        }
    }

    pub fn subscribe(&self) -> ChangeReceiver {
        self.notifier.subscribe()
    }

    /// Read `key` from the primary tier, falling back to `default` when the
    /// entry is missing, unreadable or does not decode as `T`. Every fallback
    /// is reported as a warning.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let full = self.guard.namespace(key);
        match self.primary.read(&full) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Could not decode '{}': {}. Using default.", key, e);
                    default
                }
            },
            Ok(None) => {
                warn!("No entry for '{}'. Using default.", key);
                default
            }
            Err(e) => {
                warn!("Could not read '{}': {}. Using default.", key, e);
                default
            }
        }
    }

    /// Serialize and store `value` under `key`.
    ///
    /// Returns `false` when serialization or the primary write fails; the
    /// previous value is then left untouched. A failed mirror write is only
    /// logged.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match encode(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Refusing to store '{}': {}", key, e);
                return false;
            }
        };

        let full = self.guard.namespace(key);
        if let Err(e) = self.primary.write(&full, &raw) {
            warn!("Primary write for '{}' failed: {}", key, e);
            return false;
        }
        if let Err(e) = self.secondary.write(&full, &raw) {
            warn!("Mirror write for '{}' failed: {}", key, e);
        }

        self.notifier.publish(&full, Some(&raw), TierKind::Primary);
        true
    }

    /// Delete `key` from both tiers. Missing keys count as removed.
    pub fn remove(&self, key: &str) -> bool {
        let full = self.guard.namespace(key);
        if let Err(e) = self.primary.delete(&full) {
            warn!("Primary delete for '{}' failed: {}", key, e);
            return false;
        }
        if let Err(e) = self.secondary.delete(&full) {
            warn!("Mirror delete for '{}' failed: {}", key, e);
        }

        self.notifier.publish(&full, None, TierKind::Primary);
        true
    }

    /// Delete every namespaced key from the primary tier.
    ///
    /// The mirror keeps its copies until the next reconciliation, which will
    /// restore the Persistent ones. Nothing is published, so subscribers
    /// that mirror deletes cannot wipe those copies.
    pub fn clear_all(&self) -> usize {
        let keys = match self.primary.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Could not list primary keys: {}", e);
                return 0;
            }
        };

        let mut cleared = 0;
        for key in keys.iter().filter(|k| self.guard.strip(k).is_some()) {
            match self.primary.delete(key) {
                Ok(()) => cleared += 1,
                Err(e) => warn!("Could not clear '{}': {}", key, e),
            }
        }
        cleared
    }

    /// Flush both tiers to their backing media.
    pub fn flush(&self) {
        for kind in [TierKind::Primary, TierKind::Secondary] {
            match self.tier(kind).flush() {
                Ok(()) => info!("Flushed {} tier", kind),
                Err(e) => warn!("Could not flush {} tier: {}", kind, e),
            }
        }
    }

    /// Startup cleanup of Ephemeral keys from the primary tier.
    pub fn purge_non_persistent(&self) -> usize {
        match self.guard.purge_non_persistent(self.primary.as_ref()) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Startup cleanup aborted: {}", e);
                0
            }
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SledTier;
    use std::collections::HashMap;

    fn store_with(primary: Arc<MemoryTier>, secondary: Arc<MemoryTier>) -> KeyStore {
        KeyStore::new(NamespaceGuard::new("t_"), primary, secondary)
    }

    #[test]
    fn test_get_returns_latest_set_then_default_after_remove() {
        let store = KeyStore::in_memory();
        assert_eq!(store.get("counter", 7u32), 7);

        for v in [1u32, 5, 3] {
            assert!(store.set("counter", &v));
            assert_eq!(store.get("counter", 0u32), v);
        }

        assert!(store.remove("counter"));
        assert_eq!(store.get("counter", 42u32), 42);
        // Idempotent
        assert!(store.remove("counter"));
    }

    #[test]
    fn test_set_writes_both_tiers() {
        let primary = Arc::new(MemoryTier::new());
        let secondary = Arc::new(MemoryTier::new());
        let store = store_with(primary.clone(), secondary.clone());

        assert!(store.set("users", &vec!["a", "b"]));
        assert_eq!(primary.read("t_users").unwrap().as_deref(), Some(r#"["a","b"]"#));
        assert_eq!(secondary.read("t_users").unwrap().as_deref(), Some(r#"["a","b"]"#));
    }

    #[test]
    fn test_serialization_failure_leaves_state() {
        let store = KeyStore::in_memory();
        assert!(store.set("map", &1u8));

        // JSON object keys must be strings
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);
        assert!(!store.set("map", &bad));
        assert_eq!(store.get("map", 0u8), 1);
    }

    #[test]
    fn test_primary_quota_failure() {
        let primary = Arc::new(MemoryTier::with_quota(16));
        let store = store_with(primary, Arc::new(MemoryTier::new()));

        assert!(store.set("k", &"small"));
        assert!(!store.set("k", &"far too large for this quota"));
        assert_eq!(store.get("k", String::new()), "small");
    }

    #[test]
    fn test_secondary_failure_does_not_fail_write() {
        let secondary = Arc::new(MemoryTier::new());
        secondary.set_available(false);
        let store = store_with(Arc::new(MemoryTier::new()), secondary);

        assert!(store.set("users", &1u8));
        assert_eq!(store.get("users", 0u8), 1);
    }

    #[test]
    fn test_get_corrupt_entry_falls_back() {
        let primary = Arc::new(MemoryTier::new());
        primary.write("t_users", "{not json").unwrap();
        let store = store_with(primary, Arc::new(MemoryTier::new()));

        assert_eq!(store.get("users", vec![1u8]), vec![1u8]);
    }

    #[test]
    fn test_get_unavailable_primary_falls_back() {
        let primary = Arc::new(MemoryTier::new());
        let store = store_with(primary.clone(), Arc::new(MemoryTier::new()));
        assert!(store.set("k", &9u8));

        primary.set_available(false);
        assert_eq!(store.get("k", 0u8), 0);
        assert!(!store.set("k", &10u8));
        assert!(!store.remove("k"));
    }

    #[test]
    fn test_clear_all_only_touches_primary() {
        let primary = Arc::new(MemoryTier::new());
        let secondary = Arc::new(MemoryTier::new());
        let store = store_with(primary.clone(), secondary.clone());

        store.set("users", &1u8);
        store.set("tempFlag", &true);
        primary.write("foreign", "x").unwrap();

        assert_eq!(store.clear_all(), 2);
        assert_eq!(primary.keys().unwrap(), vec!["foreign".to_string()]);
        assert_eq!(secondary.len(), 2);
    }

    #[test]
    fn test_clear_all_publishes_nothing() {
        let store = KeyStore::in_memory();
        store.set("users", &1u8);
        let mut rx = store.subscribe();

        assert_eq!(store.clear_all(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_flush_sled_tiers() {
        let primary = Arc::new(SledTier::temporary().unwrap());
        let store = KeyStore::new(NamespaceGuard::default(), primary.clone(), Arc::new(MemoryTier::new()));

        assert!(store.set("users", &3u8));
        store.flush();
        assert_eq!(primary.read(&store.guard().namespace("users")).unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_writes_publish_events() {
        let store = KeyStore::in_memory();
        let mut rx = store.subscribe();
        let key = store.guard().namespace("users");

        store.set("users", &1u8);
        store.remove("users");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.key, key);
        assert_eq!(first.new_value.as_deref(), Some("1"));
        assert_eq!(first.origin, Some(TierKind::Primary));
        assert!(rx.try_recv().unwrap().is_delete());
    }

    #[test]
    fn test_failed_write_publishes_nothing() {
        let primary = Arc::new(MemoryTier::new());
        primary.set_available(false);
        let store = store_with(primary, Arc::new(MemoryTier::new()));
        let mut rx = store.subscribe();

        assert!(!store.set("users", &1u8));
        assert!(rx.try_recv().is_err());
    }
}
