//! # Duration Parsing
//!
//! Parses the short duration strings used for timeout and poll settings.

use super::ConfigError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+)(?P<unit>ms|[smhd])$")
        .expect("duration regex is a valid literal - this should never happen")
});

/// Parse a duration string into `std::time::Duration`
/// Supports formats: "500ms", "30s", "20m", "3h", "1d"
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration {
            value: value.to_string(),
            reason: "duration cannot be empty".to_string(),
        });
    }

    let lower = trimmed.to_lowercase();
    let captures = DURATION_REGEX
        .captures(&lower)
        .ok_or_else(|| ConfigError::InvalidDuration {
            value: trimmed.to_string(),
            reason: "expected <number><unit> with unit ms, s, m, h or d (e.g. '30s', '20m')"
                .to_string(),
        })?;

    let number: u64 = captures["number"]
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::InvalidDuration {
            value: trimmed.to_string(),
            reason: e.to_string(),
        })?;

    if number == 0 {
        return Err(ConfigError::InvalidDuration {
            value: trimmed.to_string(),
            reason: "duration must be greater than 0".to_string(),
        });
    }

    let duration = match &captures["unit"] {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(number.saturating_mul(60)),
        "h" => Duration::from_secs(number.saturating_mul(3600)),
        "d" => Duration::from_secs(number.saturating_mul(86_400)),
        unit => {
            return Err(ConfigError::InvalidDuration {
                value: trimmed.to_string(),
                reason: format!("unknown unit '{unit}'"),
            })
        }
    };

    Ok(duration)
}

/// Render a duration in the largest unit that divides it exactly
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }
    let secs = duration.as_secs();
    match secs {
        s if s % 86_400 == 0 && s > 0 => format!("{}d", s / 86_400),
        s if s % 3600 == 0 && s > 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 && s > 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

/// Serde adapter for `Duration` fields written as duration strings
pub mod serde_duration {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for `Option<Duration>`
    pub mod option {
        use super::super::{format_duration, parse_duration};
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        #[allow(
            clippy::ref_option,
            reason = "serde's serialize_with signature passes &Option<T>"
        )]
        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => serializer.serialize_some(&format_duration(*duration)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| parse_duration(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
