//! # Reconciler
//!
//! Drives one lifecycle call for one resource through
//! `Submitting -> Polling -> Converging -> Done`, ending in `Failed` or
//! `TimedOut` when something goes wrong.
//!
//! - **Create** submits, waits for the operation handle, re-reads the
//!   resource until the adapter calls it terminal and projects it onto the
//!   caller's record.
//! - **Update** reads first and asks the adapter how to apply the change.
//!   Unchanged resources are not written; fields that cannot change in place
//!   trigger delete-to-completion followed by a fresh create.
//! - **Delete** treats not-found as success at every step and only reports
//!   success once a read confirms the resource is gone.
//!
//! Every call gets its deadline from the configured budget when it starts.
//! The caller's record is only touched after a successful projection.

pub mod backoff;
pub mod error;
pub mod poller;
pub mod projector;
mod tracker;
pub mod verify;

pub use error::{FailureKind, ReconcileError, ReplacementFailure, ReplacementStep};
pub use poller::{PollResult, Poller};
pub use projector::{project_onto, Projection, ProjectionError};

use crate::client::{request_status, ApiError};
use crate::config::{format_duration, PollSettings, Timeouts};
use crate::resource::{
    Identified, Locator, Operation, OperationHandle, RemoteObject, RemoteStatus, ResourceAdapter,
    ResourceKind, UpdatePlan,
};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, Instrument, Span};
use tracker::{reconcile_span, OperationTracker, Outcome};
use verify::DestroyVerdict;

/// State of a lifecycle call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Submitting,
    Polling,
    Converging,
    Done,
    Failed,
    TimedOut,
}

/// What a resource-keyed poll waits for
#[derive(Debug, Clone, Copy)]
enum Expect {
    Settled,
    Gone,
}

enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

/// Run `future` unless the deadline passes or the caller cancels first
async fn bounded<T>(
    future: impl Future<Output = T>,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<T, Interruption> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interruption::Cancelled),
        result = tokio::time::timeout_at(deadline, future) => {
            result.map_err(|_| Interruption::DeadlineExceeded)
        }
    }
}

/// Bookkeeping for one call: phase transitions and error construction
struct Call {
    kind: ResourceKind,
    operation: Operation,
    id: Option<String>,
    budget: Duration,
    phase: Phase,
}

impl Call {
    fn new(kind: ResourceKind, operation: Operation, id: Option<String>, budget: Duration) -> Self {
        Self {
            kind,
            operation,
            id,
            budget,
            phase: Phase::Submitting,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "{} {} phase change", self.operation, self.kind);
        self.phase = next;
    }

    fn fail(
        &mut self,
        failure: FailureKind,
        last_status: Option<RemoteStatus>,
        message: impl Into<String>,
    ) -> ReconcileError {
        self.advance(if failure == FailureKind::Timeout {
            Phase::TimedOut
        } else {
            Phase::Failed
        });
        ReconcileError::new(self.kind, self.id.clone(), self.operation, failure, message)
            .with_status(last_status)
    }

    fn api_failure(&mut self, e: &ApiError) -> ReconcileError {
        self.fail(FailureKind::of_api_error(e), None, e.to_string())
    }

    fn interrupted(
        &mut self,
        interruption: &Interruption,
        last_status: Option<RemoteStatus>,
    ) -> ReconcileError {
        match interruption {
            Interruption::DeadlineExceeded => {
                let message = format!("deadline of {} exceeded", format_duration(self.budget));
                self.fail(FailureKind::Timeout, last_status, message)
            }
            Interruption::Cancelled => {
                self.fail(FailureKind::Cancelled, last_status, "cancelled by caller")
            }
        }
    }

    /// Turn a finished poll into a value or a classified error
    fn settle<T>(&mut self, result: PollResult<T>) -> Result<T, ReconcileError> {
        match result {
            PollResult::Succeeded(value) => Ok(value),
            PollResult::Failed { status, message } => {
                Err(self.fail(FailureKind::RemoteRejected, status, message))
            }
            PollResult::TimedOut {
                last_status: None,
                last_error: Some(e),
            } => Err(self.fail(
                FailureKind::TransportError,
                None,
                format!("no status could be read before the deadline: {e}"),
            )),
            PollResult::TimedOut { last_status, .. } => {
                Err(self.interrupted(&Interruption::DeadlineExceeded, last_status))
            }
            PollResult::Pending => Err(self.interrupted(&Interruption::DeadlineExceeded, None)),
            PollResult::Cancelled { last_status } => {
                Err(self.interrupted(&Interruption::Cancelled, last_status))
            }
        }
    }
}

/// Lifecycle state machine for one resource kind
#[derive(Debug, Clone)]
pub struct Reconciler<A> {
    adapter: A,
    timeouts: Timeouts,
    poller: Poller,
}

impl<A: ResourceAdapter> Reconciler<A> {
    pub fn new(adapter: A, timeouts: Timeouts, poll: PollSettings) -> Self {
        Self {
            adapter,
            timeouts,
            poller: Poller::new(poll),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Create the resource described by `desired`
    ///
    /// On success `desired` carries the new id and every value the API
    /// reports. On failure `desired` is left as it was.
    ///
    /// # Errors
    ///
    /// Returns a `ReconcileError` classifying why the resource did not reach
    /// a successful terminal state.
    pub async fn create(
        &self,
        desired: &mut A::Desired,
        cancel: &CancellationToken,
    ) -> Result<RemoteObject<A::Properties>, ReconcileError> {
        let span = reconcile_span!("reconcile.create", A::KIND, field::Empty);
        let tracker = OperationTracker::new(span.clone(), A::KIND, Operation::Create);
        let result = self.run_create(desired, cancel).instrument(span).await;
        tracker.finish(result)
    }

    /// Bring resource `id` in line with `desired`
    ///
    /// # Errors
    ///
    /// Returns a `ReconcileError`; a failed replacement is reported as
    /// `ReplacementFailed` naming the step that failed.
    pub async fn update(
        &self,
        id: &str,
        desired: &mut A::Desired,
        cancel: &CancellationToken,
    ) -> Result<RemoteObject<A::Properties>, ReconcileError> {
        let span = reconcile_span!("reconcile.update", A::KIND, id);
        let tracker = OperationTracker::new(span.clone(), A::KIND, Operation::Update);
        let result = self.run_update(id, desired, cancel).instrument(span).await;
        tracker.finish(result)
    }

    /// Delete resource `id`; `desired` supplies the parent ids
    ///
    /// Deleting a resource that no longer exists succeeds.
    ///
    /// # Errors
    ///
    /// Returns a `ReconcileError`, `PostconditionViolated` when the delete
    /// reported success but the resource could not be confirmed gone.
    pub async fn delete(
        &self,
        id: &str,
        desired: &A::Desired,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let span = reconcile_span!("reconcile.delete", A::KIND, id);
        let tracker = OperationTracker::new(span.clone(), A::KIND, Operation::Delete);
        let result = self
            .run_delete(id, desired, cancel)
            .instrument(span)
            .await
            .map(|outcome| ((), outcome));
        tracker.finish(result)
    }

    async fn run_create(
        &self,
        desired: &mut A::Desired,
        cancel: &CancellationToken,
    ) -> Result<(RemoteObject<A::Properties>, Outcome), ReconcileError> {
        let budget = self.timeouts.budget(Operation::Create);
        let deadline = Instant::now() + budget;
        let mut call = Call::new(A::KIND, Operation::Create, None, budget);

        info!("Creating {}", A::KIND);
        let submitted = bounded(self.adapter.create(desired), deadline, cancel)
            .await
            .map_err(|i| call.interrupted(&i, None))?
            .map_err(|e| call.api_failure(&e))?;
        call.id = Some(submitted.locator.id.clone());
        Span::current().record("resource.id", submitted.locator.id.as_str());
        info!("{} {} accepted", A::KIND, submitted.locator);

        self.await_handle(&mut call, &submitted.handle, Expect::Settled, deadline, cancel)
            .await?;
        let remote = self
            .converge(&mut call, &submitted.locator, deadline, cancel)
            .await?;
        self.commit(&mut call, desired, &remote)?;
        Ok((remote, Outcome::Created))
    }

    async fn run_update(
        &self,
        id: &str,
        desired: &mut A::Desired,
        cancel: &CancellationToken,
    ) -> Result<(RemoteObject<A::Properties>, Outcome), ReconcileError> {
        let budget = self.timeouts.budget(Operation::Update);
        let deadline = Instant::now() + budget;
        let mut call = Call::new(A::KIND, Operation::Update, Some(id.to_string()), budget);
        let locator = self.adapter.locate(desired, id);

        let current = bounded(self.adapter.find_by_id(&locator), deadline, cancel)
            .await
            .map_err(|i| call.interrupted(&i, None))?
            .map_err(|e| call.api_failure(&e))?;

        let handle = match self.adapter.classify_update(&current, desired) {
            UpdatePlan::NoChange => {
                info!("{} {} already matches, nothing to submit", A::KIND, locator);
                None
            }
            UpdatePlan::InPlace => {
                info!("Updating {} {}", A::KIND, locator);
                let handle = bounded(self.adapter.update(&locator, desired), deadline, cancel)
                    .await
                    .map_err(|i| call.interrupted(&i, Some(current.metadata.state.clone())))?
                    .map_err(|e| call.api_failure(&e))?;
                Some(handle)
            }
            UpdatePlan::RequiresReplacement { fields } => {
                let remote = self.replace(id, desired, &fields, cancel).await?;
                return Ok((remote, Outcome::Replaced));
            }
        };

        let outcome = match &handle {
            Some(handle) => {
                self.await_handle(&mut call, handle, Expect::Settled, deadline, cancel)
                    .await?;
                Outcome::Updated
            }
            None => Outcome::Unchanged,
        };
        let remote = self.converge(&mut call, &locator, deadline, cancel).await?;
        self.commit(&mut call, desired, &remote)?;
        Ok((remote, outcome))
    }

    /// Delete to completion, then create afresh
    ///
    /// Each half runs under its own budget. Once the old resource is gone
    /// its id is cleared from `desired`, even if the create then fails.
    async fn replace(
        &self,
        id: &str,
        desired: &mut A::Desired,
        fields: &[&'static str],
        cancel: &CancellationToken,
    ) -> Result<RemoteObject<A::Properties>, ReconcileError> {
        info!(
            "{} {} must be replaced, cannot change in place: {}",
            A::KIND,
            id,
            fields.join(", ")
        );
        if let Err(cause) = self.run_delete(id, desired, cancel).await {
            return Err(ReconcileError::replacement_failed(
                A::KIND,
                Some(id.to_string()),
                ReplacementStep::Delete,
                cause,
            ));
        }

        let mut fresh = desired.clone();
        fresh.set_id(None);
        match self.run_create(&mut fresh, cancel).await {
            Ok((remote, _)) => {
                info!("{} {} replaced by {}", A::KIND, id, remote.id);
                *desired = fresh;
                Ok(remote)
            }
            Err(cause) => {
                desired.set_id(None);
                Err(ReconcileError::replacement_failed(
                    A::KIND,
                    Some(id.to_string()),
                    ReplacementStep::Create,
                    cause,
                ))
            }
        }
    }

    async fn run_delete(
        &self,
        id: &str,
        desired: &A::Desired,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ReconcileError> {
        let budget = self.timeouts.budget(Operation::Delete);
        let deadline = Instant::now() + budget;
        let mut call = Call::new(A::KIND, Operation::Delete, Some(id.to_string()), budget);
        let locator = self.adapter.locate(desired, id);

        info!("Deleting {} {}", A::KIND, locator);
        let submitted = bounded(self.adapter.delete(&locator), deadline, cancel)
            .await
            .map_err(|i| call.interrupted(&i, None))?;
        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) if e.is_not_found() => {
                info!("{} {} already gone", A::KIND, locator);
                call.advance(Phase::Done);
                return Ok(Outcome::AlreadyGone);
            }
            Err(e) => return Err(call.api_failure(&e)),
        };

        self.await_handle(&mut call, &handle, Expect::Gone, deadline, cancel)
            .await?;

        call.advance(Phase::Converging);
        let verdict = bounded(verify::confirm_gone(&self.adapter, &locator), deadline, cancel)
            .await
            .map_err(|i| call.interrupted(&i, None))?;
        match verdict {
            DestroyVerdict::Gone => {
                call.advance(Phase::Done);
                Ok(Outcome::Deleted)
            }
            DestroyVerdict::StillPresent(object) => Err(call.fail(
                FailureKind::PostconditionViolated,
                Some(object.metadata.state),
                "delete reported success but the resource still exists",
            )),
            DestroyVerdict::Unverifiable(e) => Err(call.fail(
                FailureKind::PostconditionViolated,
                None,
                format!("delete reported success but the resource could not be confirmed gone: {e}"),
            )),
        }
    }

    /// Wait for a submitted operation to finish
    async fn await_handle(
        &self,
        call: &mut Call,
        handle: &OperationHandle,
        expect: Expect,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        call.advance(Phase::Polling);
        match handle {
            OperationHandle::Request { href } => {
                let api = self.adapter.api();
                let result = self
                    .poller
                    .poll(
                        || request_status(api, href),
                        RemoteStatus::is_request_terminal,
                        RemoteStatus::is_request_success,
                        deadline,
                        cancel,
                    )
                    .await;
                call.settle(result).map(drop)
            }
            OperationHandle::Resource(locator) => {
                let result = match expect {
                    Expect::Settled => {
                        self.poller
                            .poll(
                                || self.presence(locator),
                                |s| self.adapter.is_terminal(s),
                                |s| self.adapter.is_success(s),
                                deadline,
                                cancel,
                            )
                            .await
                    }
                    Expect::Gone => {
                        self.poller
                            .poll(
                                || self.presence(locator),
                                |s| matches!(s, RemoteStatus::Gone | RemoteStatus::Failed),
                                |s| *s == RemoteStatus::Gone,
                                deadline,
                                cancel,
                            )
                            .await
                    }
                };
                call.settle(result).map(drop)
            }
        }
    }

    /// Re-read the resource until the adapter calls its status terminal
    async fn converge(
        &self,
        call: &mut Call,
        locator: &Locator,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<RemoteObject<A::Properties>, ReconcileError> {
        call.advance(Phase::Converging);
        let result = self
            .poller
            .poll(
                || self.presence(locator),
                |s| self.adapter.is_terminal(s),
                |s| self.adapter.is_success(s),
                deadline,
                cancel,
            )
            .await;
        call.settle(result)?.ok_or_else(|| {
            call.fail(
                FailureKind::RemoteRejected,
                Some(RemoteStatus::Gone),
                "resource disappeared while converging",
            )
        })
    }

    /// Read the resource, mapping not-found to `None`
    async fn presence(
        &self,
        locator: &Locator,
    ) -> Result<Option<RemoteObject<A::Properties>>, ApiError> {
        match self.adapter.find_by_id(locator).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn commit(
        &self,
        call: &mut Call,
        desired: &mut A::Desired,
        remote: &RemoteObject<A::Properties>,
    ) -> Result<(), ReconcileError> {
        project_onto(desired, remote).map_err(|e| {
            call.fail(
                FailureKind::ProjectionError,
                Some(remote.metadata.state.clone()),
                e.to_string(),
            )
        })?;
        call.advance(Phase::Done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::scripted::ScriptedApi;
    use crate::client::{CloudApi, Method};
    use crate::resource::{
        Datacenter, DatacenterAdapter, Lan, LanAdapter, NodePool, NodePoolAdapter,
    };
    use serde_json::json;
    use std::sync::Arc;

    const R1: &str = "https://api.example.test/requests/r-1/status";
    const R2: &str = "https://api.example.test/requests/r-2/status";

    fn request(status: &str) -> serde_json::Value {
        json!({"id": "r", "metadata": {"status": status, "message": format!("request {status}")}})
    }

    fn lan_object(state: &str, public: bool) -> serde_json::Value {
        json!({
            "id": "7",
            "metadata": {"state": state, "etag": "e1"},
            "properties": {"name": "frontend", "public": public}
        })
    }

    fn desired_lan() -> Lan {
        Lan {
            datacenter_id: "dc".to_string(),
            name: Some("frontend".to_string()),
            public: true,
            ..Lan::default()
        }
    }

    fn fast() -> PollSettings {
        PollSettings::fixed(Duration::from_secs(1))
    }

    fn lan_reconciler(api: &Arc<ScriptedApi>) -> Reconciler<LanAdapter> {
        Reconciler::new(
            LanAdapter::new(Arc::clone(api) as Arc<dyn CloudApi>),
            Timeouts::new(Duration::from_secs(60)),
            fast(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_polls_request_then_projects() {
        let api = Arc::new(ScriptedApi::new());
        api.accepted(Method::Post, "/datacenters/dc/lans", json!({"id": "7"}), R1);
        api.ok(Method::Get, R1, request("QUEUED"));
        api.ok(Method::Get, R1, request("RUNNING"));
        api.ok(Method::Get, R1, request("DONE"));
        api.ok(Method::Get, "/datacenters/dc/lans/7", lan_object("AVAILABLE", true));

        let mut desired = desired_lan();
        let remote = lan_reconciler(&api)
            .create(&mut desired, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(remote.id, "7");
        assert_eq!(desired.id.as_deref(), Some("7"));
        assert_eq!(api.count(Method::Get, R1), 3);
        assert_eq!(api.count(Method::Post, "/datacenters/dc/lans"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_leaves_record_untouched() {
        let api = Arc::new(ScriptedApi::new());
        api.accepted(Method::Post, "/datacenters/dc/lans", json!({"id": "7"}), R1);
        api.ok(Method::Get, R1, request("FAILED"));

        let mut desired = desired_lan();
        let err = lan_reconciler(&api)
            .create(&mut desired, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.failure, FailureKind::RemoteRejected);
        assert_eq!(err.id.as_deref(), Some("7"));
        assert_eq!(err.last_status, Some(RemoteStatus::Failed));
        assert!(err.message.contains("request FAILED"));
        assert_eq!(desired, desired_lan());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out_within_budget() {
        let api = Arc::new(ScriptedApi::new());
        api.accepted(Method::Post, "/datacenters/dc/lans", json!({"id": "7"}), R1);
        api.ok(Method::Get, R1, request("RUNNING"));
        let reconciler = Reconciler::new(
            LanAdapter::new(Arc::clone(&api) as Arc<dyn CloudApi>),
            Timeouts::new(Duration::from_secs(10)),
            fast(),
        );

        let start = Instant::now();
        let mut desired = desired_lan();
        let err = reconciler
            .create(&mut desired, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.failure, FailureKind::Timeout);
        assert!(err.is_retryable());
        assert_eq!(err.last_status, Some(RemoteStatus::Running));
        assert!(start.elapsed() <= Duration::from_secs(11));
        assert!(desired.id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_submit_sends_nothing() {
        let api = Arc::new(ScriptedApi::new());
        api.accepted(Method::Post, "/datacenters/dc/lans", json!({"id": "7"}), R1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = lan_reconciler(&api)
            .create(&mut desired_lan(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.failure, FailureKind::Cancelled);
        assert_eq!(api.count(Method::Post, "/datacenters/dc/lans"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_without_changes_submits_nothing() {
        let api = Arc::new(ScriptedApi::new());
        api.ok(Method::Get, "/datacenters/dc/lans/7", lan_object("AVAILABLE", true));

        let mut desired = desired_lan();
        lan_reconciler(&api)
            .update("7", &mut desired, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(api.count(Method::Patch, "/datacenters/dc/lans/7"), 0);
        assert_eq!(desired.id.as_deref(), Some("7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_place_update_waits_for_resource_state() {
        let api = Arc::new(ScriptedApi::new());
        api.ok(Method::Get, "/datacenters/dc/lans/7", lan_object("AVAILABLE", false));
        api.ok(Method::Get, "/datacenters/dc/lans/7", lan_object("BUSY", true));
        api.ok(Method::Get, "/datacenters/dc/lans/7", lan_object("AVAILABLE", true));
        api.ok(Method::Patch, "/datacenters/dc/lans/7", json!({"id": "7"}));

        let mut desired = desired_lan();
        let remote = lan_reconciler(&api)
            .update("7", &mut desired, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(remote.properties.public, Some(true));
        assert_eq!(api.count(Method::Patch, "/datacenters/dc/lans/7"), 1);
    }

    fn datacenter(location: &str, state: &str, id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "metadata": {"state": state},
            "properties": {"name": "prod", "location": location, "version": 1}
        })
    }

    fn desired_datacenter() -> Datacenter {
        Datacenter {
            id: Some("dc-1".to_string()),
            name: Some("prod".to_string()),
            location: "de/txl".to_string(),
            ..Datacenter::default()
        }
    }

    fn datacenter_reconciler(api: &Arc<ScriptedApi>) -> Reconciler<DatacenterAdapter> {
        Reconciler::new(
            DatacenterAdapter::new(Arc::clone(api) as Arc<dyn CloudApi>),
            Timeouts::new(Duration::from_secs(60)),
            fast(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_change_replaces_datacenter() {
        let api = Arc::new(ScriptedApi::new());
        api.ok(Method::Get, "/datacenters/dc-1", datacenter("de/fra", "AVAILABLE", "dc-1"));
        api.fail(Method::Get, "/datacenters/dc-1", 404);
        api.accepted(Method::Delete, "/datacenters/dc-1", json!({}), R1);
        api.ok(Method::Get, R1, request("DONE"));
        api.accepted(Method::Post, "/datacenters", json!({"id": "dc-2"}), R2);
        api.ok(Method::Get, R2, request("DONE"));
        api.ok(Method::Get, "/datacenters/dc-2", datacenter("de/txl", "AVAILABLE", "dc-2"));

        let mut desired = desired_datacenter();
        datacenter_reconciler(&api)
            .update("dc-1", &mut desired, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(desired.id.as_deref(), Some("dc-2"));
        assert_eq!(desired.location, "de/txl");
        assert_eq!(desired.version, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_replacement_create_reports_completed_delete() {
        let api = Arc::new(ScriptedApi::new());
        api.ok(Method::Get, "/datacenters/dc-1", datacenter("de/fra", "AVAILABLE", "dc-1"));
        api.fail(Method::Get, "/datacenters/dc-1", 404);
        api.accepted(Method::Delete, "/datacenters/dc-1", json!({}), R1);
        api.ok(Method::Get, R1, request("DONE"));
        api.fail(Method::Post, "/datacenters", 422);

        let mut desired = desired_datacenter();
        let err = datacenter_reconciler(&api)
            .update("dc-1", &mut desired, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.failure, FailureKind::ReplacementFailed);
        assert_eq!(
            err.replacement,
            Some(ReplacementFailure {
                failed_step: ReplacementStep::Create,
                delete_completed: true,
            })
        );
        assert!(desired.id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_of_missing_resource_succeeds() {
        let api = Arc::new(ScriptedApi::new());
        api.fail(Method::Delete, "/datacenters/dc-1", 404);

        datacenter_reconciler(&api)
            .delete("dc-1", &desired_datacenter(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(api.count(Method::Get, "/datacenters/dc-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_still_present_violates_postcondition() {
        let api = Arc::new(ScriptedApi::new());
        api.accepted(Method::Delete, "/datacenters/dc-1", json!({}), R1);
        api.ok(Method::Get, R1, request("DONE"));
        api.ok(Method::Get, "/datacenters/dc-1", datacenter("de/txl", "AVAILABLE", "dc-1"));

        let err = datacenter_reconciler(&api)
            .delete("dc-1", &desired_datacenter(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.failure, FailureKind::PostconditionViolated);
        assert_eq!(err.last_status, Some(RemoteStatus::Available));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_pool_delete_polls_until_gone() {
        let api = Arc::new(ScriptedApi::new());
        let path = "/k8s/cluster-1/nodepools/np-1";
        api.ok(Method::Delete, path, json!({}));
        api.ok(
            Method::Get,
            path,
            json!({"id": "np-1", "metadata": {"state": "DESTROYING"}, "properties": {}}),
        );
        api.fail(Method::Get, path, 404);

        let desired = NodePool {
            k8s_cluster_id: "cluster-1".to_string(),
            ..NodePool::default()
        };
        let reconciler = Reconciler::new(
            NodePoolAdapter::new(Arc::clone(&api) as Arc<dyn CloudApi>),
            Timeouts::new(Duration::from_secs(60)),
            fast(),
        );
        reconciler
            .delete("np-1", &desired, &CancellationToken::new())
            .await
            .unwrap();

        // one DESTROYING read, one not-found read and the confirming read
        assert_eq!(api.count(Method::Get, path), 3);
    }
}
