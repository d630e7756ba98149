//! Startup sequence
//! Opens both tiers, runs the startup cleanup, reconciles and loads the ledger

use std::sync::Arc;
use tracing::info;

use crate::account::{HashedCredentialStore, LedgerRegistry};
use crate::config::{LedgerConfig, TierBackend};
use crate::error::StorageError;
use crate::storage::{KeyStore, KeyValueTier, MemoryTier, NamespaceGuard, SledTier, SyncReconciler};

pub struct Services {
    pub store: Arc<KeyStore>,
    pub reconciler: SyncReconciler,
    pub registry: LedgerRegistry,
}

pub fn open_tier(backend: &TierBackend) -> Result<Arc<dyn KeyValueTier>, StorageError> {
    match backend {
        TierBackend::Sled { path } => {
            info!("Persistence: Opening Sled DB at '{}'...", path);
            Ok(Arc::new(SledTier::open(path)?))
        }
        TierBackend::Memory { quota_bytes: Some(quota) } => Ok(Arc::new(MemoryTier::with_quota(*quota))),
        TierBackend::Memory { quota_bytes: None } => Ok(Arc::new(MemoryTier::new())),
    }
}

/// Bring the ledger up: ephemeral keys from the previous run are purged from
/// the primary tier before the tiers are reconciled.
pub fn bootstrap(config: &LedgerConfig) -> Result<Services, StorageError> {
    let primary = open_tier(&config.storage.primary)?;
    let secondary = open_tier(&config.storage.secondary)?;
    let guard = NamespaceGuard::new(config.storage.namespace.clone());

    Ok(start(Arc::new(KeyStore::new(guard, primary, secondary))))
}

/// Startup steps over an already-built store.
pub fn start(store: Arc<KeyStore>) -> Services {
    store.purge_non_persistent();

    let reconciler = SyncReconciler::new(store.clone());
    reconciler.sync();

    let credentials = HashedCredentialStore::new(store.clone());
    let registry = LedgerRegistry::new(store.clone(), Box::new(credentials));

    Services {
        store,
        reconciler,
        registry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    #[test]
    fn test_startup_purges_ephemeral_keys() {
        let primary = Arc::new(MemoryTier::new());
        let secondary = Arc::new(MemoryTier::new());
        let guard = NamespaceGuard::default();
        primary.write(&guard.namespace("tempFlag"), "true").unwrap();
        primary.write(&guard.namespace("users"), "{}").unwrap();

        let store = Arc::new(KeyStore::new(guard.clone(), primary.clone(), secondary.clone()));
        let services = start(store);

        assert!(primary.read(&guard.namespace("tempFlag")).unwrap().is_none());
        assert!(primary.read(&guard.namespace("users")).unwrap().is_some());
        // Purge runs before sync, so the ephemeral key never reaches the mirror
        assert!(secondary.read(&guard.namespace("tempFlag")).unwrap().is_none());
        assert!(services.registry.accounts().is_empty());
    }

    #[test]
    fn test_startup_restores_directory_from_mirror() {
        let primary = Arc::new(MemoryTier::new());
        let secondary = Arc::new(MemoryTier::new());
        let guard = NamespaceGuard::default();
        let users = r#"{"u1":{"id":"u1","balance":7,"lifetime_earned":7,"status":"active","joined_at":"2026-01-01T00:00:00Z"}}"#;
        secondary.write(&guard.namespace("users"), users).unwrap();
        secondary.write(&guard.namespace("current_user"), "null").unwrap();

        let services = start(Arc::new(KeyStore::new(guard.clone(), primary.clone(), secondary)));

        assert_eq!(services.registry.lookup("u1").unwrap().balance, 7);
        assert!(primary.read(&guard.namespace("current_user")).unwrap().is_none());
    }

    #[test]
    fn test_bootstrap_from_memory_config() {
        let config = LedgerConfig {
            log_level: "info".to_string(),
            storage: StorageConfig {
                namespace: "boot_".to_string(),
                primary: TierBackend::Memory { quota_bytes: None },
                secondary: TierBackend::Memory { quota_bytes: Some(4096) },
            },
        };
        let services = bootstrap(&config).unwrap();
        assert_eq!(services.store.guard().prefix(), "boot_");
        assert!(services.reconciler.sync().is_noop());
    }
}
