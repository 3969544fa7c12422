//! # API Errors
//!
//! Structured errors raised at the transport boundary.

use serde::Deserialize;
use thiserror::Error;

/// Error returned by a single Cloud API request
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (connect, reset, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status
    #[error("HTTP {status}{}: {message}", code_suffix(.code))]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build a not-found error for objects the API does not address directly
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Status {
            status: 404,
            code: None,
            message: message.into(),
        }
    }

    /// HTTP status code, if the API answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether repeating the same request may succeed
    ///
    /// Transport failures, throttling (429) and server errors (5xx) are transient.
    /// Everything else (auth failures, validation errors, 404) is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Decode(_) => false,
        }
    }

    /// Turn an error response body into an `ApiError`
    ///
    /// Understands the Cloud API error envelope and falls back to the raw body.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) if !envelope.messages.is_empty() => {
                let code = envelope
                    .messages
                    .iter()
                    .find_map(|m| m.error_code.clone());
                let message = envelope
                    .messages
                    .iter()
                    .filter_map(|m| m.message.as_deref())
                    .collect::<Vec<_>>()
                    .join("; ");
                Self::Status {
                    status: envelope.http_status.unwrap_or(status),
                    code,
                    message,
                }
            }
            _ => Self::Status {
                status,
                code: None,
                message: body.trim().to_string(),
            },
        }
    }
}

#[allow(clippy::ref_option, reason = "thiserror passes fields by reference")]
fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                code: None,
                message: e.to_string(),
            }
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    http_status: Option<u16>,
    #[serde(default)]
    messages: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorMessage {
    error_code: Option<String>,
    message: Option<String>,
}
