//! Dual-tier key-value storage
//!
//! Two independent tiers sit behind the [`KeyValueTier`] trait: the primary
//! (durable) tier and the secondary (mirror) tier. [`KeyStore`] is the only
//! writer callers see; [`SyncReconciler`] keeps the mirror convergent.

pub mod namespace;
pub mod store;
pub mod sync;
pub mod tier;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

pub use namespace::NamespaceGuard;
pub use store::KeyStore;
pub use sync::{SyncReconciler, SyncReport};
pub use tier::{MemoryTier, SledTier};

/// Which physical storage area an entry or event belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Primary,
    Secondary,
}

impl TierKind {
    pub fn other(self) -> Self {
        match self {
            TierKind::Primary => TierKind::Secondary,
            TierKind::Secondary => TierKind::Primary,
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::Primary => write!(f, "primary"),
            TierKind::Secondary => write!(f, "secondary"),
        }
    }
}

impl FromStr for TierKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(TierKind::Primary),
            "secondary" => Ok(TierKind::Secondary),
            other => Err(StorageError::TierUnavailable(format!("unknown tier '{}'", other))),
        }
    }
}

/// One physical storage area holding raw serialized entries.
///
/// Keys handed to a tier are already namespaced; tiers know nothing about
/// the prefix or about persistence classes.
pub trait KeyValueTier: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Push buffered writes to the backing medium. In-memory tiers have none.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
