//! Span attributes and metrics for one lifecycle call.

use super::error::ReconcileError;
use crate::observability::metrics;
use crate::resource::{Operation, ResourceKind};
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Span};

/// How a successful call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Created,
    Updated,
    Unchanged,
    Replaced,
    Deleted,
    AlreadyGone,
}

impl Outcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Replaced => "replaced",
            Self::Deleted => "deleted",
            Self::AlreadyGone => "already_gone",
        }
    }
}

/// Builds the span every lifecycle call runs in
macro_rules! reconcile_span {
    ($name:literal, $kind:expr, $id:expr) => {
        tracing::info_span!(
            $name,
            resource.kind = %$kind,
            resource.id = $id,
            call.id = %uuid::Uuid::new_v4(),
            operation.outcome = tracing::field::Empty,
            operation.success = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
            error.kind = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}
pub(crate) use reconcile_span;

pub(crate) struct OperationTracker {
    start: Instant,
    span: Span,
    kind: ResourceKind,
    operation: Operation,
}

impl OperationTracker {
    pub(crate) fn new(span: Span, kind: ResourceKind, operation: Operation) -> Self {
        Self {
            start: Instant::now(),
            span,
            kind,
            operation,
        }
    }

    /// Record the result and strip the outcome
    pub(crate) fn finish<T>(
        &self,
        result: Result<(T, Outcome), ReconcileError>,
    ) -> Result<T, ReconcileError> {
        match result {
            Ok((value, outcome)) => {
                self.record_success(outcome);
                Ok(value)
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    fn record_success(&self, outcome: Outcome) {
        let elapsed = self.start.elapsed();
        self.span.record("operation.outcome", outcome.as_str());
        self.span.record("operation.success", true);
        self.span.record("operation.duration_ms", millis(elapsed));
        metrics::record_operation(
            self.kind.as_str(),
            self.operation.as_str(),
            outcome.as_str(),
            elapsed.as_secs_f64(),
        );
        self.span.in_scope(|| {
            info!(
                "{} {} finished ({}) in {:.1}s",
                self.operation,
                self.kind,
                outcome.as_str(),
                elapsed.as_secs_f64()
            );
        });
    }

    fn record_error(&self, e: &ReconcileError) {
        let elapsed = self.start.elapsed();
        self.span.record("operation.success", false);
        self.span.record("operation.duration_ms", millis(elapsed));
        self.span.record("error.kind", e.failure.as_str());
        self.span.record("error.message", e.message.as_str());
        metrics::record_operation(
            self.kind.as_str(),
            self.operation.as_str(),
            "failed",
            elapsed.as_secs_f64(),
        );
        metrics::increment_operation_errors(
            self.kind.as_str(),
            self.operation.as_str(),
            e.failure.as_str(),
        );
        self.span.in_scope(|| {
            if e.is_retryable() {
                warn!("{}", e);
            } else {
                error!("{}", e);
            }
        });
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
