//! Application Configuration
//!
//! YAML configuration for a store: which root it owns, how it is
//! authorized, which backend holds the data and where logging is set up.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::permission::{PermissionMode, RuleEntry, RuleSet};
use crate::service::Store;
use crate::storage::config::StorageConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreSection,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Fine-grained rules. When non-empty the store uses the rule model and
    /// `store.permission` is ignored.
    pub rules: Vec<RuleEntry>,
}

/// Identity and authority of the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Store id; defaults to the root when empty
    pub id: String,
    /// Root container every key is confined to
    pub root: String,
    pub permission: PermissionMode,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            root: "store".to_string(),
            permission: PermissionMode::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "store_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file, use defaults if not found
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Store id, falling back to the root.
    pub fn store_id(&self) -> &str {
        if self.store.id.is_empty() {
            &self.store.root
        } else {
            &self.store.id
        }
    }

    /// Build the configured backend and open a store on it.
    pub fn open_store(&self) -> Result<Store> {
        let storage = self.storage.create_store()?;
        if self.rules.is_empty() {
            info!(
                "Opening store {} in {} mode",
                self.store_id(),
                self.store.permission
            );
            Store::new(self.store.permission, &self.store.root, storage)
        } else {
            info!(
                "Opening store {} with {} permission rules",
                self.store_id(),
                self.rules.len()
            );
            let rules = RuleSet::from_entries(self.rules.clone())?;
            Store::with_rules(self.store_id(), &self.store.root, storage, rules)
        }
    }
}
