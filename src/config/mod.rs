//! # Configuration
//!
//! Engine settings loaded from environment variables.
//!
//! ## Modules
//!
//! - `engine` - API endpoint, credentials, polling and logging settings
//! - `timeouts` - Per-operation poll deadlines
//! - `duration` - Duration string parsing (`30s`, `20m`, `3h`)

pub mod duration;
pub mod engine;
pub mod timeouts;

pub use duration::{format_duration, parse_duration};
pub use engine::{Credentials, EngineConfig, LogFormat, PollSettings};
pub use timeouts::{TimeoutOverrides, Timeouts};

use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("no IONOS credentials configured: set IONOS_TOKEN or IONOS_USERNAME and IONOS_PASSWORD")]
    MissingCredentials,
}

/// Read a variable through `lookup` and parse it, or return `default` when unset
fn parsed_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Read a duration variable, `None` when unset
fn optional_duration<F>(lookup: &F, key: &str) -> Result<Option<std::time::Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|raw| parse_duration(&raw))
        .transpose()
}

/// Read a variable as string, treating blank values as unset
fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}
