//! `MULTIDOC_*` environment overlay.
//!
//! Nested keys use `__`: `MULTIDOC_DISCOVERY__REFRESH_DEBOUNCE_MS=250`.
//! `MULTIDOC_LOG*` variables belong to the logging setup and are not config keys.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, Map};

const PREFIX: &str = "MULTIDOC";
const LOGGING_PREFIX: &str = "MULTIDOC_LOG";

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(overlay(std::env::vars())))
}

fn overlay(vars: impl Iterator<Item = (String, String)>) -> Environment {
    let vars: Map<String, String> = vars
        .filter(|(key, _)| key.starts_with(PREFIX) && !key.starts_with(LOGGING_PREFIX))
        .collect();
    Environment::with_prefix(PREFIX)
        .separator("__")
        .try_parsing(true)
        .source(Some(vars))
}
