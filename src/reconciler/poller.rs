//! # Operation Poller
//!
//! Repeatedly queries a status until it is terminal, the deadline passes or
//! the call is cancelled.
//!
//! Every status query runs under `tokio::time::timeout_at(deadline)` and
//! races the cancellation token, and every wait is cut to the time left
//! before the deadline. A poll therefore never overruns its deadline by more
//! than one in-flight query.

use super::backoff::PollBackoff;
use crate::client::{ApiError, RequestStatus};
use crate::config::PollSettings;
use crate::observability::metrics;
use crate::resource::{RemoteObject, RemoteStatus};
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A value that carries a remote status
pub trait Observed {
    fn status(&self) -> RemoteStatus;

    /// Remote-supplied detail, reported with failures
    fn message(&self) -> Option<String> {
        None
    }
}

impl<P> Observed for RemoteObject<P> {
    fn status(&self) -> RemoteStatus {
        self.metadata.state.clone()
    }
}

impl Observed for RequestStatus {
    fn status(&self) -> RemoteStatus {
        self.metadata.status.clone()
    }

    fn message(&self) -> Option<String> {
        self.metadata.message.clone()
    }
}

/// A resource that may have disappeared; `None` observes as `Gone`
impl<P> Observed for Option<RemoteObject<P>> {
    fn status(&self) -> RemoteStatus {
        self.as_ref()
            .map_or(RemoteStatus::Gone, |object| object.metadata.state.clone())
    }
}

/// Outcome of a status check
///
/// `Pending` is only produced by a single check; `Poller::poll` keeps
/// polling until one of the other outcomes.
#[derive(Debug, Clone)]
pub enum PollResult<T> {
    Pending,
    Succeeded(T),
    /// Terminal failure status, or a query error that will not go away
    Failed {
        status: Option<RemoteStatus>,
        message: String,
    },
    TimedOut {
        last_status: Option<RemoteStatus>,
        last_error: Option<ApiError>,
    },
    Cancelled {
        last_status: Option<RemoteStatus>,
    },
}

/// Classify one observation
pub fn check<T: Observed>(
    observed: T,
    is_terminal: impl Fn(&RemoteStatus) -> bool,
    is_success: impl Fn(&RemoteStatus) -> bool,
) -> PollResult<T> {
    let status = observed.status();
    if !is_terminal(&status) {
        return PollResult::Pending;
    }
    if is_success(&status) {
        return PollResult::Succeeded(observed);
    }
    let message = observed
        .message()
        .unwrap_or_else(|| format!("remote reported {status}"));
    PollResult::Failed {
        status: Some(status),
        message,
    }
}

/// Status poller with a capped backoff between queries
#[derive(Debug, Clone)]
pub struct Poller {
    settings: PollSettings,
}

impl Poller {
    #[must_use]
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    /// Poll `probe` until a terminal status, `deadline` or cancellation
    ///
    /// Transient probe errors are retried until the deadline. Any other
    /// probe error ends the poll as `Failed`.
    pub async fn poll<T, F, Fut>(
        &self,
        mut probe: F,
        is_terminal: impl Fn(&RemoteStatus) -> bool,
        is_success: impl Fn(&RemoteStatus) -> bool,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> PollResult<T>
    where
        T: Observed,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut backoff = PollBackoff::from_settings(&self.settings);
        let mut last_status: Option<RemoteStatus> = None;
        let mut last_error: Option<ApiError> = None;

        loop {
            let attempt = tokio::select! {
                biased;
                () = cancel.cancelled() => return PollResult::Cancelled { last_status },
                attempt = tokio::time::timeout_at(deadline, probe()) => attempt,
            };

            match attempt {
                Err(_deadline_elapsed) => {
                    return PollResult::TimedOut {
                        last_status,
                        last_error,
                    };
                }
                Ok(Ok(observed)) => {
                    let status = observed.status();
                    metrics::increment_status_polls(status.as_str());
                    last_error = None;
                    match check(observed, &is_terminal, &is_success) {
                        PollResult::Pending => {
                            if status.is_unknown() {
                                warn!("Unrecognised remote status '{}', treating as pending", status);
                            } else {
                                debug!("Remote status {}, still pending", status);
                            }
                            last_status = Some(status);
                        }
                        outcome => return outcome,
                    }
                }
                Ok(Err(e)) if e.is_transient() => {
                    warn!("Transient error while polling, retrying: {}", e);
                    last_error = Some(e);
                }
                Ok(Err(e)) => {
                    return PollResult::Failed {
                        status: last_status,
                        message: e.to_string(),
                    };
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return PollResult::TimedOut {
                    last_status,
                    last_error,
                };
            }
            let wait = backoff.next_delay().min(deadline - now);
            tokio::select! {
                biased;
                () = cancel.cancelled() => return PollResult::Cancelled { last_status },
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}
