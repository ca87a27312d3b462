//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};

/// Directory name used under the platform config directory
pub const APP_DIR_NAME: &str = "agent-m";

/// Get the application config directory (e.g. ~/.config/agent-m/)
pub fn app_config_dir() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| AppError::config("Could not determine config directory"))
}

/// Get the default config file path (<config_dir>/agent-m/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(app_config_dir()?.join("config.json"))
}
