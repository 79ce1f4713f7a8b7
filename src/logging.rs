//! Logger setup
//!
//! A log4rs YAML file is used when it exists, otherwise `env_logger` reads
//! `RUST_LOG`. Patterns can print the store tagged on each operation with
//! `{X(store)}` and `{X(root)}`.

use log::info;
use std::path::Path;

use crate::config::LoggingConfig;
use crate::error::{Result, StoreError};

/// Install the process logger. Returns `Ok(false)` if one was already
/// installed.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let path = Path::new(&config.config_file);
    if path.exists() {
        let log_config = log4rs::config::load_config_file(path, Default::default()).map_err(|e| {
            StoreError::Config(format!("invalid log config {}: {}", path.display(), e))
        })?;
        if log4rs::init_config(log_config).is_err() {
            return Ok(false);
        }
        info!("Logging configured from {}", path.display());
        Ok(true)
    } else {
        Ok(env_logger::Builder::from_default_env().try_init().is_ok())
    }
}
