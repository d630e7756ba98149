//! Account registry and ledger operations

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::credentials::CredentialStore;
use super::history::{PointEntry, PointHistory, PointKind};
use super::types::{AccountDirectory, AccountId, ProfileUpdate, Registration, UserAccount};
use super::withdrawal::{WithdrawalBook, WithdrawalRequest};
use crate::error::LedgerError;
use crate::storage::KeyStore;

pub const USERS_KEY: &str = "users";
pub const CURRENT_USER_KEY: &str = "current_user";

/// Owns the account directory and the active-user reference.
///
/// Every mutation is applied in memory first and then persisted. Storage
/// failures are logged and otherwise ignored, so the in-memory state always
/// reflects the last successful operation.
pub struct LedgerRegistry {
    store: Arc<KeyStore>,
    credentials: Box<dyn CredentialStore>,
    history: PointHistory,
    withdrawals: WithdrawalBook,
    directory: AccountDirectory,
    active: Option<AccountId>,
}

impl LedgerRegistry {
    /// Build a registry over `store`, loading any persisted accounts and
    /// the previous active user if it still exists.
    pub fn new(store: Arc<KeyStore>, credentials: Box<dyn CredentialStore>) -> Self {
        let directory: AccountDirectory = store.get(USERS_KEY, AccountDirectory::new());
        let active = store
            .get::<Option<UserAccount>>(CURRENT_USER_KEY, None)
            .map(|snapshot| snapshot.id)
            .filter(|id| directory.contains_key(id));

        info!("Ledger loaded with {} account(s)", directory.len());

        Self {
            history: PointHistory::new(store.clone()),
            withdrawals: WithdrawalBook::new(store.clone()),
            store,
            credentials,
            directory,
            active,
        }
    }

    /// Open a new account with zero balance. Fails on a taken id.
    pub fn register(&mut self, registration: Registration) -> Result<UserAccount, LedgerError> {
        if self.directory.contains_key(&registration.id) {
            return Err(LedgerError::DuplicateId(registration.id));
        }

        self.credentials
            .add_credential(&registration.id, &registration.credential)?;

        let account = UserAccount::new(&registration, Utc::now());
        self.directory.insert(account.id.clone(), account.clone());
        self.persist_directory();

        info!("Registered account '{}'", account.id);
        Ok(account)
    }

    /// Make `id` the active user and stamp `last_login`. No credential check.
    pub fn login(&mut self, id: &str) -> Result<UserAccount, LedgerError> {
        let account = self.account_mut(id)?;
        account.last_login = Some(Utc::now());
        let snapshot = account.clone();

        self.active = Some(snapshot.id.clone());
        self.persist_directory();
        self.persist_active();

        info!("'{}' logged in", id);
        Ok(snapshot)
    }

    /// Check `secret` with the credential store, then log in.
    pub fn authenticate(&mut self, id: &str, secret: &str) -> Result<UserAccount, LedgerError> {
        if !self.directory.contains_key(id) {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        if !self.credentials.verify_credential(id, secret) {
            warn!("Rejected credentials for '{}'", id);
            return Err(LedgerError::InvalidCredentials(id.to_string()));
        }
        self.login(id)
    }

    /// Clear the active user. The account row is kept.
    pub fn logout(&mut self) {
        if let Some(id) = self.active.take() {
            info!("'{}' logged out", id);
        }
        self.store.remove(CURRENT_USER_KEY);
    }

    /// The current row of the active user, if any.
    pub fn active(&self) -> Option<&UserAccount> {
        self.active.as_ref().and_then(|id| self.directory.get(id))
    }

    /// Copy of the account stored under `id`.
    pub fn lookup(&self, id: &str) -> Result<UserAccount, LedgerError> {
        self.directory
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Every account, ordered by id.
    pub fn accounts(&self) -> Vec<UserAccount> {
        self.directory.values().cloned().collect()
    }

    /// Set a balance outright; negative amounts are clamped to zero.
    pub fn set_absolute_balance(&mut self, id: &str, amount: i64) -> Result<UserAccount, LedgerError> {
        let account = self.account_mut(id)?;
        account.set_balance(amount);
        let snapshot = account.clone();

        self.persist_directory();
        if self.active.as_deref() == Some(id) {
            self.persist_active();
        }
        self.history
            .record(PointEntry::new(&snapshot, PointKind::Set, snapshot.balance as i64));

        Ok(snapshot)
    }

    /// Adjust the active account by `delta`.
    ///
    /// Negative deltas also lower `lifetime_earned`, unlike
    /// [`set_absolute_balance`](Self::set_absolute_balance).
    pub fn apply_delta_to_active(&mut self, delta: i64) -> Result<UserAccount, LedgerError> {
        let id = self.active.clone().ok_or(LedgerError::NoActiveUser)?;
        let account = self.account_mut(&id)?;
        account.apply_delta(delta);
        let snapshot = account.clone();

        self.persist_directory();
        self.persist_active();
        self.history
            .record(PointEntry::new(&snapshot, PointKind::Delta, delta));

        Ok(snapshot)
    }

    pub fn update_profile(&mut self, id: &str, update: ProfileUpdate) -> Result<UserAccount, LedgerError> {
        let account = self.account_mut(id)?;
        account.apply_profile(update);
        let snapshot = account.clone();
        self.persist_after_edit(id);
        Ok(snapshot)
    }

    pub fn update_avatar(&mut self, id: &str, avatar: impl Into<String>) -> Result<UserAccount, LedgerError> {
        let account = self.account_mut(id)?;
        account.avatar = Some(avatar.into());
        let snapshot = account.clone();
        self.persist_after_edit(id);
        Ok(snapshot)
    }

    /// Withdraw points from the active account.
    ///
    /// The debit lowers the balance only; `lifetime_earned` is untouched.
    pub fn request_withdrawal(&mut self, amount: i64) -> Result<WithdrawalRequest, LedgerError> {
        let id = self.active.clone().ok_or(LedgerError::NoActiveUser)?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let requested = amount as u64;

        let account = self.account_mut(&id)?;
        if requested > account.balance {
            return Err(LedgerError::InsufficientFunds {
                balance: account.balance,
                requested,
            });
        }
        account.balance -= requested;
        let snapshot = account.clone();

        self.persist_directory();
        self.persist_active();
        self.history
            .record(PointEntry::new(&snapshot, PointKind::Withdrawal, -amount));

        let request = WithdrawalRequest::new(id, requested);
        self.withdrawals.record(request.clone());
        info!("Withdrawal {} of {} requested by '{}'", request.id, requested, request.user_id);
        Ok(request)
    }

    pub fn history(&self, id: &str) -> Vec<PointEntry> {
        self.history.for_user(id)
    }

    pub fn withdrawals(&self, id: &str) -> Vec<WithdrawalRequest> {
        self.withdrawals.for_user(id)
    }

    /// Sum of `id`'s withdrawals that are still pending.
    pub fn pending_withdrawal_total(&self, id: &str) -> u64 {
        self.withdrawals.pending_total(id)
    }

    /// Wipe credentials and in-memory state, then reload the directory from
    /// the Persistent tier.
    pub fn reset_all(&mut self) {
        self.credentials.reset();
        self.directory.clear();
        self.active = None;
        self.store.remove(CURRENT_USER_KEY);

        self.directory = self.store.get(USERS_KEY, AccountDirectory::new());
        info!("Ledger reset; reloaded {} account(s)", self.directory.len());
    }

    fn account_mut(&mut self, id: &str) -> Result<&mut UserAccount, LedgerError> {
        self.directory
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    fn persist_after_edit(&self, id: &str) {
        self.persist_directory();
        if self.active.as_deref() == Some(id) {
            self.persist_active();
        }
    }

    fn persist_directory(&self) {
        if !self.store.set(USERS_KEY, &self.directory) {
            warn!("Account directory not persisted; changes held in memory");
        }
    }

    fn persist_active(&self) {
        match self.active() {
            Some(account) => {
                if !self.store.set(CURRENT_USER_KEY, account) {
                    warn!("Active user snapshot not persisted");
                }
            }
            None => {
                self.store.remove(CURRENT_USER_KEY);
            }
        }
    }
}
