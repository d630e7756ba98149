//! Reconciliation between the primary and secondary tiers

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::namespace::PersistenceClass;
use super::{KeyStore, KeyValueTier, TierKind};
use crate::notifier::{ChangeEvent, ChangeReceiver};

/// What one `sync()` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub to_secondary: usize,
    pub to_primary: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.to_secondary == 0 && self.to_primary == 0
    }
}

pub struct SyncReconciler {
    store: Arc<KeyStore>,
}

impl SyncReconciler {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    /// Two passes, in order: every namespaced primary entry is copied to the
    /// secondary tier, then Persistent entries found only in the secondary
    /// tier are restored to the primary tier.
    pub fn sync(&self) -> SyncReport {
        let primary = self.store.tier(TierKind::Primary);
        let secondary = self.store.tier(TierKind::Secondary);

        let report = SyncReport {
            to_secondary: self.copy_pass(primary, secondary, false),
            to_primary: self.copy_pass(secondary, primary, true),
        };

        if report.is_noop() {
            debug!("Tiers already converged");
        } else {
            info!(
                "Sync: {} key(s) mirrored, {} key(s) restored",
                report.to_secondary, report.to_primary
            );
        }
        report
    }

    fn copy_pass(&self, from: &dyn KeyValueTier, to: &dyn KeyValueTier, persistent_only: bool) -> usize {
        let guard = self.store.guard();
        let keys = match from.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Sync pass skipped, could not list keys: {}", e);
                return 0;
            }
        };

        let mut copied = 0;
        for key in keys {
            let Some(bare) = guard.strip(&key) else {
                continue;
            };
            if persistent_only && guard.classify(bare) == PersistenceClass::Ephemeral {
                continue;
            }

            let value = match from.read(&key) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Sync could not read '{}': {}", bare, e);
                    continue;
                }
            };
            if matches!(to.read(&key), Ok(Some(ref current)) if *current == value) {
                continue;
            }
            match to.write(&key, &value) {
                Ok(()) => copied += 1,
                Err(e) => warn!("Sync could not write '{}': {}", bare, e),
            }
        }
        copied
    }

    /// Mirror a change made directly on one tier into the other tier.
    ///
    /// Events from an unknown tier or outside the namespace are dropped.
    /// The mirrored write goes straight to the tier and publishes nothing,
    /// so it cannot loop back here. Returns whether the other tier changed.
    pub fn on_external_change(&self, event: &ChangeEvent) -> bool {
        let Some(origin) = event.origin else {
            debug!("Dropping change on '{}' from unknown tier", event.key);
            return false;
        };
        if self.store.guard().strip(&event.key).is_none() {
            debug!("Dropping change on foreign key '{}'", event.key);
            return false;
        }

        let target = self.store.tier(origin.other());
        // Re-read instead of trusting any earlier view of the tier
        let current = match target.read(&event.key) {
            Ok(current) => current,
            Err(e) => {
                warn!("Cannot mirror '{}' into {} tier: {}", event.key, origin.other(), e);
                return false;
            }
        };

        let result = match (&event.new_value, current) {
            (Some(new), Some(ref cur)) if new == cur => return false,
            (Some(new), _) => target.write(&event.key, new),
            (None, None) => return false,
            (None, Some(_)) => target.delete(&event.key),
        };

        match result {
            Ok(()) => {
                debug!("Mirrored change on '{}' into {} tier", event.key, origin.other());
                true
            }
            Err(e) => {
                warn!("Cannot mirror '{}' into {} tier: {}", event.key, origin.other(), e);
                false
            }
        }
    }

    /// Apply every event already queued on `events`. Returns how many
    /// changed the other tier.
    pub fn drain(&self, events: &mut ChangeReceiver) -> usize {
        let mut applied = 0;
        while let Ok(event) = events.try_recv() {
            if self.on_external_change(&event) {
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryTier, NamespaceGuard};

    struct Fixture {
        primary: Arc<MemoryTier>,
        secondary: Arc<MemoryTier>,
        store: Arc<KeyStore>,
        sync: SyncReconciler,
    }

    fn fixture() -> Fixture {
        let primary = Arc::new(MemoryTier::new());
        let secondary = Arc::new(MemoryTier::new());
        let store = Arc::new(KeyStore::new(
            NamespaceGuard::new("t_"),
            primary.clone(),
            secondary.clone(),
        ));
        let sync = SyncReconciler::new(store.clone());
        Fixture { primary, secondary, store, sync }
    }

    fn snapshot(tier: &MemoryTier) -> Vec<(String, Option<String>)> {
        tier.keys()
            .unwrap()
            .into_iter()
            .map(|k| {
                let v = tier.read(&k).unwrap();
                (k, v)
            })
            .collect()
    }

    #[test]
    fn test_primary_entries_mirrored() {
        let f = fixture();
        f.primary.write("t_tempFlag", "true").unwrap();
        f.primary.write("t_users", "{}").unwrap();
        f.primary.write("foreign", "1").unwrap();

        let report = f.sync.sync();
        assert_eq!(report.to_secondary, 2);
        assert_eq!(f.secondary.read("t_tempFlag").unwrap().as_deref(), Some("true"));
        assert!(f.secondary.read("foreign").unwrap().is_none());
    }

    #[test]
    fn test_persistent_key_restored_from_secondary() {
        let f = fixture();
        f.secondary.write("t_users", r#"{"u1":1}"#).unwrap();

        let report = f.sync.sync();
        assert_eq!(report.to_primary, 1);
        assert_eq!(f.store.get("users", serde_json::json!({})), serde_json::json!({"u1": 1}));
    }

    #[test]
    fn test_ephemeral_key_not_restored_from_secondary() {
        let f = fixture();
        f.secondary.write("t_current_user", r#""u1""#).unwrap();

        let report = f.sync.sync();
        assert_eq!(report.to_primary, 0);
        assert!(f.primary.read("t_current_user").unwrap().is_none());
    }

    #[test]
    fn test_sync_idempotent() {
        let f = fixture();
        f.primary.write("t_users", "1").unwrap();
        f.primary.write("t_a", "2").unwrap();
        f.secondary.write("t_point-storage", "[]").unwrap();
        f.secondary.write("t_b", "3").unwrap();
        f.secondary.write("t_users", "0").unwrap();

        let first = f.sync.sync();
        assert!(!first.is_noop());
        let after_first = (snapshot(&f.primary), snapshot(&f.secondary));

        let second = f.sync.sync();
        assert!(second.is_noop());
        assert_eq!(after_first, (snapshot(&f.primary), snapshot(&f.secondary)));

        // Primary wins for keys present on both sides
        assert_eq!(f.secondary.read("t_users").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_clear_all_then_sync_restores_persistent() {
        let f = fixture();
        f.store.set("users", &1u8);
        f.store.set("tempFlag", &true);

        f.store.clear_all();
        assert_eq!(f.store.get("users", 0u8), 0);

        f.sync.sync();
        assert_eq!(f.store.get("users", 0u8), 1);
        assert!(!f.store.get("tempFlag", false));
    }

    #[test]
    fn test_clear_all_then_drain_keeps_mirror_for_sync() {
        let f = fixture();
        f.store.set("users", &1u8);
        let mut events = f.store.subscribe();

        f.store.clear_all();
        assert_eq!(f.sync.drain(&mut events), 0);
        assert_eq!(f.secondary.read("t_users").unwrap().as_deref(), Some("1"));

        f.sync.sync();
        assert_eq!(f.store.get("users", 0u8), 1);
    }

    #[test]
    fn test_external_write_mirrored_to_other_tier() {
        let f = fixture();
        let event = ChangeEvent::new("t_users", Some("5".to_string()), TierKind::Secondary);

        assert!(f.sync.on_external_change(&event));
        assert_eq!(f.primary.read("t_users").unwrap().as_deref(), Some("5"));
        // Already mirrored
        assert!(!f.sync.on_external_change(&event));
    }

    #[test]
    fn test_external_delete_mirrored_to_other_tier() {
        let f = fixture();
        f.secondary.write("t_users", "5").unwrap();
        let event = ChangeEvent::new("t_users", None, TierKind::Primary);

        assert!(f.sync.on_external_change(&event));
        assert!(f.secondary.read("t_users").unwrap().is_none());
    }

    #[test]
    fn test_unknown_origin_and_foreign_keys_dropped() {
        let f = fixture();
        let unknown = ChangeEvent::from_raw("t_users", Some("1".to_string()), "cookies");
        let foreign = ChangeEvent::new("other_users", Some("1".to_string()), TierKind::Primary);

        assert!(!f.sync.on_external_change(&unknown));
        assert!(!f.sync.on_external_change(&foreign));
        assert!(f.primary.is_empty());
        assert!(f.secondary.is_empty());
    }

    #[test]
    fn test_mirroring_does_not_feed_back() {
        let f = fixture();
        let mut events = f.store.subscribe();

        f.store.set("users", &1u8);
        f.secondary.delete("t_users").unwrap();

        // The store's own event re-mirrors the value once
        assert_eq!(f.sync.drain(&mut events), 1);
        assert_eq!(f.secondary.read("t_users").unwrap().as_deref(), Some("1"));
        // and mirroring published nothing new
        assert_eq!(f.sync.drain(&mut events), 0);
    }
}
