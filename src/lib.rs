//! IONOS Cloud Reconciliation Engine
//!
//! Drives datacenters, LANs, NAT gateways and their rules, IP failover
//! groups and Kubernetes node pools from a desired-state record to a
//! converged remote state through the asynchronous Cloud API.
//!
//! - `client`: Cloud API transport
//! - `resource`: one adapter per resource kind
//! - `reconciler`: lifecycle state machine, poller and state projection
//! - `engine`: kind-dispatching façade
//! - `document`: YAML desired-state documents

pub mod client;
pub mod config;
pub mod constants;
pub mod document;
pub mod engine;
pub mod observability;
pub mod reconciler;
pub mod resource;

pub use client::{ApiError, CloudApi, IonosRestClient};
pub use config::{EngineConfig, Timeouts};
pub use engine::{DesiredResource, Engine};
pub use reconciler::{FailureKind, ReconcileError, Reconciler};
pub use resource::{Operation, ResourceKind};
