use thiserror::Error;

/// Failures raised by a single storage tier.
///
/// These never leave the `KeyStore` boundary: the store logs them and turns
/// them into a `false` return or a caller-supplied default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Tier unavailable: {0}")]
    TierUnavailable(String),
    #[error("Quota exceeded: {needed} bytes needed, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },
    #[error("Corrupt entry under '{0}'")]
    Corrupt(String),
}

/// Validation failures surfaced by the ledger registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Account '{0}' already exists")]
    DuplicateId(String),
    #[error("Account '{0}' not found")]
    NotFound(String),
    #[error("No active user")]
    NoActiveUser,
    #[error("Invalid credentials for '{0}'")]
    InvalidCredentials(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },
    #[error("Credential store error: {0}")]
    Credential(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}
