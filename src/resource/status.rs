//! # Remote Status
//!
//! Status values reported by the Cloud API for requests and resources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a request or resource as last observed
///
/// Request tracking reports `QUEUED`, `RUNNING`, `DONE` and `FAILED`.
/// Resources report their `metadata.state`. Every `FAILED_*` variant the API
/// emits collapses into `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteStatus {
    Queued,
    Running,
    Done,
    Busy,
    Deploying,
    Updating,
    Destroying,
    Available,
    Active,
    Inactive,
    Failed,
    /// The resource no longer exists. Never sent by the API, synthesised from a 404.
    Gone,
    /// A value this engine does not know, treated as pending
    Unknown(String),
}

impl RemoteStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Busy => "BUSY",
            Self::Deploying => "DEPLOYING",
            Self::Updating => "UPDATING",
            Self::Destroying => "DESTROYING",
            Self::Available => "AVAILABLE",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Failed => "FAILED",
            Self::Gone => "GONE",
            Self::Unknown(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Request tracking: `DONE` or `FAILED` end the request
    #[must_use]
    pub fn is_request_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    #[must_use]
    pub fn is_request_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<String> for RemoteStatus {
    fn from(raw: String) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "DONE" => Self::Done,
            "BUSY" => Self::Busy,
            "DEPLOYING" => Self::Deploying,
            "UPDATING" => Self::Updating,
            "DESTROYING" => Self::Destroying,
            "AVAILABLE" => Self::Available,
            "ACTIVE" => Self::Active,
            "INACTIVE" => Self::Inactive,
            "GONE" => Self::Gone,
            s if s == "FAILED" || s.starts_with("FAILED_") => Self::Failed,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<&str> for RemoteStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<RemoteStatus> for String {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
