//! Withdrawal requests, persisted under `withdrawal-storage`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::types::AccountId;
use crate::storage::KeyStore;

pub const WITHDRAWALS_KEY: &str = "withdrawal-storage";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: AccountId,
    pub amount: u64,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    pub fn new(user_id: impl Into<String>, amount: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            amount,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
        }
    }
}

pub struct WithdrawalBook {
    store: Arc<KeyStore>,
}

impl WithdrawalBook {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, request: WithdrawalRequest) -> bool {
        let mut requests = self.all();
        requests.push(request);
        let saved = self.store.set(WITHDRAWALS_KEY, &requests);
        if !saved {
            warn!("Withdrawal request not persisted");
        }
        saved
    }

    pub fn all(&self) -> Vec<WithdrawalRequest> {
        self.store.get(WITHDRAWALS_KEY, Vec::new())
    }

    pub fn for_user(&self, id: &str) -> Vec<WithdrawalRequest> {
        self.all().into_iter().filter(|r| r.user_id == id).collect()
    }

    pub fn pending_total(&self, id: &str) -> u64 {
        self.for_user(id)
            .iter()
            .filter(|r| r.status == WithdrawalStatus::Pending)
            .map(|r| r.amount)
            .sum()
    }
}
