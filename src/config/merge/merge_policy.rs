//! Built-in defaults applied beneath every other source.

use crate::config::{DEFAULT_REFRESH_DEBOUNCE_MS, DEFAULT_UUID_GRAMMAR};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Start a builder seeded with the defaults every key falls back to.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("discovery.remote_search_enabled", true)?
        .set_default("discovery.refresh_debounce_ms", DEFAULT_REFRESH_DEBOUNCE_MS)?
        .set_default("discovery.uuid_grammar", DEFAULT_UUID_GRAMMAR)
}
