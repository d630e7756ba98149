//! Point movement log, persisted under `point-storage`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::types::{AccountId, UserAccount};
use crate::storage::KeyStore;

pub const HISTORY_KEY: &str = "point-storage";

/// Default cap; oldest entries are dropped past it.
pub const MAX_HISTORY_ENTRIES: usize = 1_000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    /// Balance set outright
    Set,
    /// Signed adjustment of the active account
    Delta,
    Withdrawal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PointEntry {
    pub user_id: AccountId,
    pub kind: PointKind,
    pub amount: i64,
    pub balance_after: u64,
    pub lifetime_after: u64,
    pub at: DateTime<Utc>,
}

impl PointEntry {
    pub fn new(account: &UserAccount, kind: PointKind, amount: i64) -> Self {
        Self {
            user_id: account.id.clone(),
            kind,
            amount,
            balance_after: account.balance,
            lifetime_after: account.lifetime_earned,
            at: Utc::now(),
        }
    }
}

pub struct PointHistory {
    store: Arc<KeyStore>,
    limit: usize,
}

impl PointHistory {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self::with_limit(store, MAX_HISTORY_ENTRIES)
    }

    pub fn with_limit(store: Arc<KeyStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    pub fn record(&self, entry: PointEntry) -> bool {
        let mut entries = self.all();
        entries.push(entry);
        if entries.len() > self.limit {
            entries = entries.split_off(entries.len() - self.limit);
        }
        let saved = self.store.set(HISTORY_KEY, &entries);
        if !saved {
            warn!("Point history entry not persisted");
        }
        saved
    }

    pub fn all(&self) -> Vec<PointEntry> {
        self.store.get(HISTORY_KEY, Vec::new())
    }

    /// Entries for one account, oldest first.
    pub fn for_user(&self, id: &str) -> Vec<PointEntry> {
        self.all().into_iter().filter(|e| e.user_id == id).collect()
    }
}
