//! Account System Module
//!
//! This module implements the points ledger on top of the dual-tier store:
//! - Account registration and login
//! - Balance / lifetime-earned tracking
//! - Credential storage behind a replaceable capability
//! - Point history and withdrawal requests

pub mod types;
pub mod credentials;
pub mod history;
pub mod registry;
pub mod withdrawal;

pub use types::{AccountDirectory, AccountId, AccountStatus, ProfileUpdate, Registration, UserAccount};
pub use credentials::{CredentialStore, HashedCredentialStore};
pub use history::{PointEntry, PointHistory, PointKind};
pub use registry::LedgerRegistry;
pub use withdrawal::{WithdrawalBook, WithdrawalRequest, WithdrawalStatus};
