//! Shared error types for the Cairn workspace.
//!
//! Each crate owns the errors of its own layer (sources, store, benchmark);
//! this module carries the configuration errors every layer can hit, plus the
//! `user_message()` convention the delivery layer relies on.

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
            ConfigError::UnknownTimezone(_) => "The configured timezone is not recognised.",
        }
    }
}
