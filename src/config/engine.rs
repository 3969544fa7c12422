//! # Engine Configuration
//!
//! Engine-level settings loaded from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `IONOS_API_URL` | `https://api.ionos.com/cloudapi/v6` |
//! | `IONOS_TOKEN` | - |
//! | `IONOS_USERNAME` / `IONOS_PASSWORD` | - |
//! | `IONOS_HTTP_TIMEOUT` | `60s` |
//! | `POLL_INTERVAL_MIN` / `POLL_INTERVAL_MAX` | `1s` / `5s` |
//! | `TIMEOUT_CREATE` / `TIMEOUT_UPDATE` / `TIMEOUT_DELETE` / `TIMEOUT_DEFAULT` | per resource kind |
//! | `LOG_LEVEL` | `INFO` |
//! | `LOG_FORMAT` | `text` |

use super::{non_empty, optional_duration, parsed_or_default, ConfigError, TimeoutOverrides};
use crate::constants::{
    DEFAULT_API_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MAX_MS,
    DEFAULT_POLL_INTERVAL_MIN_MS,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

/// API credentials
///
/// Secrets are wiped from memory when the value is dropped and never
/// appear in `Debug` output.
#[derive(Clone)]
pub enum Credentials {
    /// Bearer token
    Token(Zeroizing<String>),
    /// HTTP basic auth
    Basic {
        username: String,
        password: Zeroizing<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            other => Err(format!("unknown log format '{other}', expected json or text")),
        }
    }
}

/// Bounds for the wait between two status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MIN_MS),
            max_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MAX_MS),
        }
    }
}

impl PollSettings {
    /// Constant interval between status queries
    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self {
            min_interval: interval,
            max_interval: interval,
        }
    }
}

/// Engine-level configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the Cloud API, without trailing slash
    pub api_url: String,
    /// `None` when neither a token nor username/password is set
    pub credentials: Option<Credentials>,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    pub poll: PollSettings,
    /// Overrides applied on top of each resource kind's built-in budgets
    pub timeouts: TimeoutOverrides,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credentials: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            poll: PollSettings::default(),
            timeouts: TimeoutOverrides::default(),
            log_level: "INFO".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = non_empty(&lookup, "IONOS_API_URL")
            .unwrap_or(defaults.api_url)
            .trim_end_matches('/')
            .to_string();

        let http_timeout =
            optional_duration(&lookup, "IONOS_HTTP_TIMEOUT")?.unwrap_or(defaults.http_timeout);

        let min_interval =
            optional_duration(&lookup, "POLL_INTERVAL_MIN")?.unwrap_or(defaults.poll.min_interval);
        let max_interval =
            optional_duration(&lookup, "POLL_INTERVAL_MAX")?.unwrap_or(defaults.poll.max_interval);
        if min_interval > max_interval {
            return Err(ConfigError::InvalidValue {
                key: "POLL_INTERVAL_MIN".to_string(),
                reason: "must not exceed POLL_INTERVAL_MAX".to_string(),
            });
        }

        let timeouts = TimeoutOverrides {
            create: optional_duration(&lookup, "TIMEOUT_CREATE")?,
            update: optional_duration(&lookup, "TIMEOUT_UPDATE")?,
            delete: optional_duration(&lookup, "TIMEOUT_DELETE")?,
            default: optional_duration(&lookup, "TIMEOUT_DEFAULT")?,
        };

        Ok(Self {
            api_url,
            credentials: credentials_from(&lookup),
            http_timeout,
            poll: PollSettings {
                min_interval,
                max_interval,
            },
            timeouts,
            log_level: non_empty(&lookup, "LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parsed_or_default(&lookup, "LOG_FORMAT", defaults.log_format)?,
        })
    }

    /// Credentials, or an error when none are configured
    pub fn require_credentials(&self) -> Result<&Credentials, ConfigError> {
        self.credentials
            .as_ref()
            .ok_or(ConfigError::MissingCredentials)
    }
}

/// A token wins over username/password when both are set
fn credentials_from<F>(lookup: &F) -> Option<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = non_empty(lookup, "IONOS_TOKEN") {
        return Some(Credentials::Token(Zeroizing::new(token)));
    }
    match (
        non_empty(lookup, "IONOS_USERNAME"),
        non_empty(lookup, "IONOS_PASSWORD"),
    ) {
        (Some(username), Some(password)) => Some(Credentials::Basic {
            username,
            password: Zeroizing::new(password),
        }),
        _ => None,
    }
}
