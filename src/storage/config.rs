//! Configuration for storage backends

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::Result;
use crate::storage::{
    local_store::LocalDiskStore, memory_store::MemoryStore, sqlite_store::SqliteStore, Storage,
};

/// Available storage backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Memory,
    Sqlite,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::Local
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localdisk" | "disk" => Ok(StorageBackend::Local),
            "memory" | "mem" | "mock" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

/// Configuration for the storage backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory prefix for the local disk backend
    pub base_path: String,
    /// Database file for the SQLite backend
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_path: "./data/storage".to_string(),
            db_path: "./data/store.sqlite".to_string(),
        }
    }
}

impl StorageConfig {
    /// Create a new storage configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match env::var("STORAGE_BACKEND") {
            Ok(backend_str) => match backend_str.parse::<StorageBackend>() {
                Ok(backend) => {
                    info!("Using storage backend from environment: {:?}", backend);
                    config.backend = backend;
                }
                Err(e) => {
                    warn!("Invalid storage backend in environment: {}. Using default Local.", e);
                }
            },
            Err(_) => {
                info!("No storage backend specified in environment, using default Local");
            }
        }

        if let Ok(dir) = env::var("STORAGE_DIRECTORY") {
            info!("Using storage directory from environment: {}", dir);
            config.base_path = dir;
        }
        if let Ok(db) = env::var("STORAGE_DB_FILE") {
            info!("Using database path from environment: {}", db);
            config.db_path = db;
        }

        config
    }

    /// Create a storage instance based on the configuration
    pub fn create_store(&self) -> Result<Box<dyn Storage>> {
        Ok(match self.backend {
            StorageBackend::Local => Box::new(LocalDiskStore::new(&self.base_path)?),
            StorageBackend::Memory => {
                info!("Using in-memory storage backend");
                Box::new(MemoryStore::new())
            }
            StorageBackend::Sqlite => Box::new(SqliteStore::open(&self.db_path)?),
        })
    }
}
