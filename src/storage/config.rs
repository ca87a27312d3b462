//! JSON Configuration Management
//!
//! Loads the application configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::config_path;

/// Configuration service for loading app settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigService {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields defaults. Environment overrides are applied last
    /// and the merged result is validated.
    pub fn new(path: Option<PathBuf>) -> AppResult<Self> {
        let config_path = match path {
            Some(path) => path,
            None => config_path()?,
        };

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            debug!(path = %config_path.display(), "config file absent, using defaults");
            AppConfig::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate().map_err(AppError::validation)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Path the configuration was (or would be) loaded from
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Consume the service and return the configuration
    pub fn into_config(self) -> AppConfig {
        self.config
    }
}
