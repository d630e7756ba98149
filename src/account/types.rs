//! Account type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account identifier - unique, chosen at registration
pub type AccountId = String;

/// All registered accounts, keyed by id.
pub type AccountDirectory = BTreeMap<AccountId, UserAccount>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserAccount {
    pub id: AccountId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,

    // Ledger
    pub balance: u64,
    pub lifetime_earned: u64,

    pub status: AccountStatus,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
}

/// Everything needed to open an account.
#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub id: AccountId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub credential: String,
}

impl Registration {
    pub fn new(id: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            credential: credential.into(),
            ..Default::default()
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Partial profile change; `None` fields are left as they are.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl UserAccount {
    pub fn new(registration: &Registration, now: DateTime<Utc>) -> Self {
        Self {
            id: registration.id.clone(),
            display_name: registration.display_name.clone(),
            email: registration.email.clone(),
            avatar: registration.avatar.clone(),
            balance: 0,
            lifetime_earned: 0,
            status: AccountStatus::Active,
            joined_at: now,
            last_login: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Set the balance outright. Only a net increase counts toward
    /// `lifetime_earned`.
    pub fn set_balance(&mut self, amount: i64) {
        let clamped = amount.max(0) as u64;
        if clamped > self.balance {
            self.lifetime_earned = self.lifetime_earned.saturating_add(clamped - self.balance);
        }
        self.balance = clamped;
    }

    /// Add a signed delta. The balance is clamped at zero while
    /// `lifetime_earned` moves by the full delta, negative ones included.
    pub fn apply_delta(&mut self, delta: i64) {
        self.balance = add_signed(self.balance, delta);
        self.lifetime_earned = add_signed(self.lifetime_earned, delta);
    }

    pub fn apply_profile(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.display_name {
            self.display_name = Some(name);
        }
        if let Some(email) = update.email {
            self.email = Some(email);
        }
    }
}

fn add_signed(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}
