//! Configuration
//!
//! Layered configuration for the registry: built-in defaults, the global
//! config file, an optional explicit file, and `MULTIDOC_*` environment
//! overrides.

mod facade;
pub mod merge;
mod paths;
pub mod sources;
mod storage;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use storage::{ResolvedStorage, StorageConfig};

use crate::logging::LoggingConfig;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Canonical 8-4-4-4-12 hex UUID in the uppercase form new documents are minted with.
pub const DEFAULT_UUID_GRAMMAR: &str =
    r"^[0-9A-F]{8}-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{12}$";

pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 500;

fn default_true() -> bool {
    true
}

fn default_refresh_debounce_ms() -> u64 {
    DEFAULT_REFRESH_DEBOUNCE_MS
}

fn default_uuid_grammar() -> String {
    DEFAULT_UUID_GRAMMAR.to_string()
}

/// Discovery and refresh behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Whether the remote metadata search may be launched
    #[serde(default = "default_true")]
    pub remote_search_enabled: bool,

    /// Quiet period before a refresh signal fires
    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,

    /// Regular expression every document UUID must match in full
    #[serde(default = "default_uuid_grammar")]
    pub uuid_grammar: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            remote_search_enabled: default_true(),
            refresh_debounce_ms: default_refresh_debounce_ms(),
            uuid_grammar: default_uuid_grammar(),
        }
    }
}

impl DiscoveryConfig {
    pub fn refresh_debounce_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultidocConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MultidocConfig {
    /// Reject settings the registry cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.refresh_debounce_ms == 0 {
            return Err(ConfigError::Message(
                "discovery.refresh_debounce_ms must be greater than zero".to_string(),
            ));
        }
        regex::Regex::new(&self.discovery.uuid_grammar).map_err(|e| {
            ConfigError::Message(format!("discovery.uuid_grammar is not a valid pattern: {}", e))
        })?;
        Ok(())
    }
}
