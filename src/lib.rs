pub mod account;
pub mod cli;
pub mod config;
pub mod error;
pub mod init;
pub mod notifier;
pub mod storage;

pub use account::{CredentialStore, LedgerRegistry, UserAccount};
pub use error::{LedgerError, StorageError};
pub use notifier::{ChangeEvent, ChangeNotifier};
pub use storage::{KeyStore, KeyValueTier, NamespaceGuard, SyncReconciler, TierKind};
