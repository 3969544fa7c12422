//! # Logging
//!
//! `tracing` subscriber setup. `RUST_LOG` wins over the configured level,
//! which only applies to this crate's own targets.

use crate::config::{EngineConfig, LogFormat};
use crate::constants::LOG_TARGETS;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter directives enabling `level` for the engine's targets
#[must_use]
pub fn directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter from `RUST_LOG`, falling back to `level` for the engine's targets
#[must_use]
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)))
}

/// Install the global subscriber, writing to stderr
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &EngineConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.log_level))
        .with_writer(std::io::stderr);
    let installed = match config.log_format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.with_target(false).try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
