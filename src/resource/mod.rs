//! # Resource Adapters
//!
//! One adapter per resource kind translates a desired-state record into
//! Cloud API calls and knows how to read that kind's status.
//!
//! ## Modules
//!
//! - `datacenter` - virtual datacenters
//! - `lan` - LANs inside a datacenter
//! - `nat_gateway` - NAT gateways and their embedded rule list
//! - `nat_gateway_rule` - individual NAT gateway rules
//! - `ip_failover` - IP failover groups (entries of a LAN)
//! - `node_pool` - Kubernetes node pools
//!
//! Adapters are pure data mapping plus status predicates. Ordering,
//! polling and projection live in the reconciler.

pub mod datacenter;
pub mod diff;
pub mod ip_failover;
pub mod lan;
pub mod nat_gateway;
pub mod nat_gateway_rule;
pub mod node_pool;
pub mod object;
pub mod status;

pub use datacenter::{Datacenter, DatacenterAdapter};
pub use diff::Diff;
pub use ip_failover::{IpFailover, IpFailoverAdapter};
pub use lan::{Lan, LanAdapter};
pub use nat_gateway::{NatGateway, NatGatewayAdapter};
pub use nat_gateway_rule::{NatGatewayRule, NatGatewayRuleAdapter};
pub use node_pool::{NodePool, NodePoolAdapter};
pub use object::{Metadata, RemoteObject};
pub use status::RemoteStatus;

use crate::client::{ApiError, ApiRequest, ApiResponse, CloudApi, PathBuilder};
use crate::reconciler::projector::Projection;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of resource the engine reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Datacenter,
    Lan,
    NatGateway,
    NatGatewayRule,
    IpFailover,
    NodePool,
}

impl ResourceKind {
    pub const ALL: [Self; 6] = [
        Self::Datacenter,
        Self::Lan,
        Self::NatGateway,
        Self::NatGatewayRule,
        Self::IpFailover,
        Self::NodePool,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Datacenter => "datacenter",
            Self::Lan => "lan",
            Self::NatGateway => "nat_gateway",
            Self::NatGatewayRule => "nat_gateway_rule",
            Self::IpFailover => "ip_failover",
            Self::NodePool => "node_pool",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compound key addressing one resource
///
/// `parents` are the enclosing ids, outermost first: `[datacenter]` for a
/// LAN, `[datacenter, nat_gateway]` for a rule, `[cluster]` for a node pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub kind: ResourceKind,
    pub parents: Vec<String>,
    pub id: String,
}

impl Locator {
    pub fn new(kind: ResourceKind, parents: Vec<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            parents,
            id: id.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for parent in &self.parents {
            write!(f, "{parent}/")?;
        }
        f.write_str(&self.id)
    }
}

/// What to poll after a mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationHandle {
    /// Request-status URL returned in the `Location` header
    Request { href: String },
    /// No request tracking, the resource's own state is the poll key
    Resource(Locator),
}

/// Result of submitting a create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub handle: OperationHandle,
    pub locator: Locator,
}

/// How an update has to be carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Remote already matches, nothing to submit
    NoChange,
    InPlace,
    /// The named fields cannot be changed without destroying the resource
    RequiresReplacement { fields: Vec<&'static str> },
}

/// Access to the identifier carried by a desired-state record
pub trait Identified {
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: Option<String>);
}

/// Adapter between one resource kind and the Cloud API
#[async_trait]
pub trait ResourceAdapter: Send + Sync + fmt::Debug {
    type Desired: Projection<Self::Properties> + Identified + Clone + fmt::Debug + Send + Sync;
    type Properties: DeserializeOwned + Clone + fmt::Debug + Send + Sync;

    const KIND: ResourceKind;

    fn api(&self) -> &dyn CloudApi;

    /// Compose the locator of the resource `id` described by `desired`
    fn locate(&self, desired: &Self::Desired, id: &str) -> Locator;

    async fn create(&self, desired: &Self::Desired) -> Result<Submitted, ApiError>;

    async fn update(
        &self,
        locator: &Locator,
        desired: &Self::Desired,
    ) -> Result<OperationHandle, ApiError>;

    async fn delete(&self, locator: &Locator) -> Result<OperationHandle, ApiError> {
        let response = self
            .api()
            .execute(ApiRequest::delete(PathBuilder::item(locator)))
            .await?;
        Ok(handle_for(&response, locator))
    }

    async fn find_by_id(
        &self,
        locator: &Locator,
    ) -> Result<RemoteObject<Self::Properties>, ApiError> {
        self.api()
            .execute(ApiRequest::get(PathBuilder::item(locator)))
            .await?
            .json()
    }

    /// `AVAILABLE`, `INACTIVE` and `FAILED` end an operation
    fn is_terminal(&self, status: &RemoteStatus) -> bool {
        matches!(
            status,
            RemoteStatus::Available | RemoteStatus::Inactive | RemoteStatus::Failed
        )
    }

    fn is_success(&self, status: &RemoteStatus) -> bool {
        matches!(status, RemoteStatus::Available | RemoteStatus::Inactive)
    }

    /// Compare the current remote object with the desired record
    fn classify_update(
        &self,
        current: &RemoteObject<Self::Properties>,
        desired: &Self::Desired,
    ) -> UpdatePlan;
}

/// Poll key for a mutating response
#[must_use]
pub fn handle_for(response: &ApiResponse, locator: &Locator) -> OperationHandle {
    match response.request_href() {
        Some(href) => OperationHandle::Request {
            href: href.to_string(),
        },
        None => OperationHandle::Resource(locator.clone()),
    }
}

/// POST `body` to the kind's collection and pick up the server-assigned id
pub(crate) async fn create_in(
    api: &dyn CloudApi,
    kind: ResourceKind,
    parents: Vec<String>,
    body: serde_json::Value,
) -> Result<Submitted, ApiError> {
    let response = api
        .execute(ApiRequest::post(PathBuilder::collection(kind, &parents), body))
        .await?;
    let id = response
        .object_id()
        .ok_or_else(|| ApiError::Decode(format!("{kind} create response carries no id")))?
        .to_string();
    let locator = Locator::new(kind, parents, id);
    Ok(Submitted {
        handle: handle_for(&response, &locator),
        locator,
    })
}

/// Serialize a property set, dropping unset fields
pub(crate) fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(ApiError::from)
}
