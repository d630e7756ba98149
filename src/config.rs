use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::storage::namespace::DEFAULT_NAMESPACE;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LedgerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub primary: TierBackend,
    pub secondary: TierBackend,
}

/// Where a tier keeps its entries.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum TierBackend {
    Sled { path: String },
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quota_bytes: Option<usize>,
    },
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig {
                namespace: default_namespace(),
                primary: TierBackend::Sled {
                    path: "./data/primary".to_string(),
                },
                secondary: TierBackend::Sled {
                    path: "./data/mirror".to_string(),
                },
            },
        }
    }
}

impl LedgerConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let s = toml::to_string_pretty(self)?;
        std::fs::write(path, s)?;
        Ok(())
    }

    /// Load the config at `path`, writing a default one when none exists.
    /// A broken file falls back to defaults rather than aborting startup.
    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match Self::load(path) {
                Ok(c) => {
                    info!("Config loaded from {}", path);
                    c
                }
                Err(e) => {
                    warn!("{}. Using defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Config file not found at '{}'. Creating default.", path);
            let config = Self::default();
            if let Err(e) = config.save(path) {
                warn!("Could not write default config: {}", e);
            }
            config
        }
    }
}
