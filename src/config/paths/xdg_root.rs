//! XDG Base Directory utilities for multidoc data and configuration.

use crate::error::CoreError;
use std::path::{Path, PathBuf};

/// Get XDG data home directory
///
/// Returns `$XDG_DATA_HOME` if set, otherwise defaults to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg_data_home));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

/// Returns `$XDG_DATA_HOME/multidoc/`
pub fn multidoc_data_dir() -> Result<PathBuf, CoreError> {
    let data_home = data_home().ok_or_else(|| {
        CoreError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(data_home.join("multidoc"))
}

/// Default local documents directory: `$XDG_DATA_HOME/multidoc/Documents/`
pub fn default_local_docs_dir() -> Result<PathBuf, CoreError> {
    Ok(multidoc_data_dir()?.join("Documents"))
}

/// Default record snapshot file: `$XDG_DATA_HOME/multidoc/records.json`
pub fn default_records_file() -> Result<PathBuf, CoreError> {
    Ok(multidoc_data_dir()?.join("records.json"))
}

/// Global config file: `$XDG_CONFIG_HOME/multidoc/config.toml`
pub fn global_config_file() -> Option<PathBuf> {
    config_home().map(|home| home.join("multidoc").join("config.toml"))
}

/// Create `dir` and its parents if missing.
///
/// Returns `true` when the directory had to be created.
pub fn ensure_dir(dir: &Path) -> Result<bool, CoreError> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir).map_err(|e| {
        CoreError::ConfigError(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    Ok(true)
}
