//! Credential storage behind the `CredentialStore` capability

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::AccountId;
use crate::error::LedgerError;
use crate::storage::KeyStore;

pub const CREDENTIALS_KEY: &str = "auth_credentials";

/// Holds secrets for the ledger. The registry only ever calls these three
/// methods and never looks at secret material itself.
pub trait CredentialStore {
    fn add_credential(&mut self, id: &str, secret: &str) -> Result<(), LedgerError>;

    fn verify_credential(&self, id: &str, secret: &str) -> bool;

    /// Forget every credential.
    fn reset(&mut self);
}

/// Argon2id hashes persisted under the `auth_credentials` key.
pub struct HashedCredentialStore {
    store: Arc<KeyStore>,
    params: Params,
}

impl HashedCredentialStore {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self {
            store,
            params: Params::default(),
        }
    }

    /// Use custom argon2 cost parameters (cheap ones keep tests fast).
    pub fn with_params(store: Arc<KeyStore>, params: Params) -> Self {
        Self { store, params }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn load(&self) -> BTreeMap<AccountId, String> {
        self.store.get(CREDENTIALS_KEY, BTreeMap::new())
    }

    pub fn hash_secret(&self, secret: &str) -> Result<String, LedgerError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| LedgerError::Credential(e.to_string()))
    }
}

impl CredentialStore for HashedCredentialStore {
    fn add_credential(&mut self, id: &str, secret: &str) -> Result<(), LedgerError> {
        let hash = self.hash_secret(secret)?;
        let mut hashes = self.load();
        hashes.insert(id.to_string(), hash);
        // Storage failures are absorbed by the store; the account stays usable
        if !self.store.set(CREDENTIALS_KEY, &hashes) {
            warn!("Credential for '{}' was not persisted", id);
        }
        Ok(())
    }

    fn verify_credential(&self, id: &str, secret: &str) -> bool {
        let hashes = self.load();
        let Some(stored) = hashes.get(id) else {
            return false;
        };
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored credential for '{}' is unreadable: {}", id, e);
                return false;
            }
        };
        // Verification uses the parameters encoded in the hash
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }

    fn reset(&mut self) {
        if self.store.remove(CREDENTIALS_KEY) {
            info!("All credentials wiped");
        }
    }
}

#[cfg(test)]
pub(crate) fn test_params() -> Params {
    Params::new(8, 1, 1, None).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> (Arc<KeyStore>, HashedCredentialStore) {
        let store = Arc::new(KeyStore::in_memory());
        let creds = HashedCredentialStore::with_params(store.clone(), test_params());
        (store, creds)
    }

    #[test]
    fn test_add_and_verify() {
        let (_store, mut creds) = credentials();
        creds.add_credential("alice", "correct horse").unwrap();

        assert!(creds.verify_credential("alice", "correct horse"));
        assert!(!creds.verify_credential("alice", "wrong"));
        assert!(!creds.verify_credential("bob", "correct horse"));
    }

    #[test]
    fn test_hashes_are_persisted_not_plaintext() {
        let (store, mut creds) = credentials();
        creds.add_credential("alice", "correct horse").unwrap();

        let hashes: BTreeMap<String, String> = store.get(CREDENTIALS_KEY, BTreeMap::new());
        let stored = &hashes["alice"];
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("correct horse"));

        // A second handle over the same storage sees it
        let other = HashedCredentialStore::new(store);
        assert!(other.verify_credential("alice", "correct horse"));
    }

    #[test]
    fn test_reset_forgets_everything() {
        let (_store, mut creds) = credentials();
        creds.add_credential("alice", "a").unwrap();
        creds.add_credential("bob", "b").unwrap();

        creds.reset();
        assert!(!creds.verify_credential("alice", "a"));
        assert!(!creds.verify_credential("bob", "b"));
    }
}
