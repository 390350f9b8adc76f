//! Document identifier grammar.

use crate::config::DEFAULT_UUID_GRAMMAR;
use crate::error::CoreError;
use once_cell::sync::Lazy;
use regex::Regex;

static DEFAULT_GRAMMAR: Lazy<UuidGrammar> = Lazy::new(|| {
    UuidGrammar::new(DEFAULT_UUID_GRAMMAR).expect("valid default uuid grammar")
});

/// Compiled UUID grammar. A candidate must match the whole pattern.
#[derive(Debug, Clone)]
pub struct UuidGrammar {
    pattern: Regex,
}

impl UuidGrammar {
    pub fn new(pattern: &str) -> Result<Self, CoreError> {
        let anchored = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            CoreError::ConfigError(format!("Invalid uuid grammar {:?}: {}", pattern, e))
        })?;
        Ok(Self { pattern: anchored })
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        self.pattern.is_match(candidate)
    }

    pub fn validate(&self, candidate: &str) -> Result<(), CoreError> {
        if self.is_valid(candidate) {
            Ok(())
        } else {
            Err(CoreError::InvalidIdentifier(candidate.to_string()))
        }
    }

    /// Mint a fresh identifier in the canonical uppercase form.
    pub fn mint() -> String {
        uuid::Uuid::new_v4().hyphenated().to_string().to_uppercase()
    }
}

impl Default for UuidGrammar {
    fn default() -> Self {
        DEFAULT_GRAMMAR.clone()
    }
}
