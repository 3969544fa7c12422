//! # Reconcile Errors
//!
//! The error returned to callers of a lifecycle operation. Every error names
//! the resource kind, its id when known, the failure class and the last
//! status observed.

use crate::client::ApiError;
use crate::resource::{Operation, RemoteStatus, ResourceKind};
use std::fmt;
use thiserror::Error;

/// Failure class of a lifecycle call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Communication failed before any terminal status was observed
    TransportError,
    /// The API reported a terminal failure or refused the request
    RemoteRejected,
    /// The deadline passed; the remote operation may still complete
    Timeout,
    /// The caller cancelled; the remote operation continues unobserved
    Cancelled,
    /// Delete reported success but the object is still there
    PostconditionViolated,
    /// The API answered with a shape this engine does not understand
    ProjectionError,
    /// One half of a delete-then-create replacement failed
    ReplacementFailed,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransportError => "transport_error",
            Self::RemoteRejected => "remote_rejected",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::PostconditionViolated => "postcondition_violated",
            Self::ProjectionError => "projection_error",
            Self::ReplacementFailed => "replacement_failed",
        }
    }

    /// Whether re-invoking the same call may succeed
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransportError | Self::Timeout | Self::Cancelled)
    }

    /// Failure class of an error returned by a request
    #[must_use]
    pub fn of_api_error(error: &ApiError) -> Self {
        match error {
            ApiError::Decode(_) => Self::ProjectionError,
            e if e.is_transient() => Self::TransportError,
            _ => Self::RemoteRejected,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half of a replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementStep {
    Delete,
    Create,
}

impl fmt::Display for ReplacementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Create => "create",
        })
    }
}

/// Which half of a replacement failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacementFailure {
    pub failed_step: ReplacementStep,
    /// The old resource is gone
    pub delete_completed: bool,
}

/// Classified failure of a lifecycle call
#[derive(Debug, Clone, Error)]
#[error(
    "{operation} {kind} {}: {failure}: {message}{}",
    display_id(.id),
    status_suffix(.last_status)
)]
pub struct ReconcileError {
    pub kind: ResourceKind,
    pub id: Option<String>,
    pub operation: Operation,
    pub failure: FailureKind,
    pub last_status: Option<RemoteStatus>,
    pub message: String,
    /// Set when `failure` is `ReplacementFailed`
    pub replacement: Option<ReplacementFailure>,
    /// Failure of the replacement step
    #[source]
    pub cause: Option<Box<ReconcileError>>,
}

#[allow(clippy::ref_option, reason = "thiserror passes fields by reference")]
fn display_id(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or("<unassigned>")
}

#[allow(clippy::ref_option, reason = "thiserror passes fields by reference")]
fn status_suffix(status: &Option<RemoteStatus>) -> String {
    status
        .as_ref()
        .map(|s| format!(" (last status {s})"))
        .unwrap_or_default()
}

impl ReconcileError {
    pub fn new(
        kind: ResourceKind,
        id: Option<String>,
        operation: Operation,
        failure: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id,
            operation,
            failure,
            last_status: None,
            message: message.into(),
            replacement: None,
            cause: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Option<RemoteStatus>) -> Self {
        self.last_status = status;
        self
    }

    /// Composite error for a failed delete-then-create
    #[must_use]
    pub fn replacement_failed(
        kind: ResourceKind,
        id: Option<String>,
        failed_step: ReplacementStep,
        cause: ReconcileError,
    ) -> Self {
        let delete_completed = failed_step == ReplacementStep::Create;
        let message = match failed_step {
            ReplacementStep::Delete => format!(
                "delete of the old resource failed ({}), create of the replacement was not attempted",
                cause.failure
            ),
            ReplacementStep::Create => format!(
                "delete of the old resource succeeded, create of the replacement failed ({}): {}",
                cause.failure, cause.message
            ),
        };
        Self {
            kind,
            id,
            operation: Operation::Update,
            failure: FailureKind::ReplacementFailed,
            last_status: cause.last_status.clone(),
            message,
            replacement: Some(ReplacementFailure {
                failed_step,
                delete_completed,
            }),
            cause: Some(Box::new(cause)),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.failure.is_retryable()
    }
}
