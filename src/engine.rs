//! # Engine
//!
//! Kind-dispatching façade over one reconciler per resource kind. All
//! reconcilers share the same `CloudApi`.

use crate::client::CloudApi;
use crate::config::{EngineConfig, PollSettings, TimeoutOverrides, Timeouts};
use crate::reconciler::{ReconcileError, Reconciler};
use crate::resource::{
    Datacenter, DatacenterAdapter, Identified, IpFailover, IpFailoverAdapter, Lan, LanAdapter,
    NatGateway, NatGatewayAdapter, NatGatewayRule, NatGatewayRuleAdapter, NodePool,
    NodePoolAdapter, ResourceAdapter, ResourceKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One desired-state record of any kind, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DesiredResource {
    Datacenter(Datacenter),
    Lan(Lan),
    NatGateway(NatGateway),
    NatGatewayRule(NatGatewayRule),
    IpFailover(IpFailover),
    NodePool(NodePool),
}

impl DesiredResource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Datacenter(_) => ResourceKind::Datacenter,
            Self::Lan(_) => ResourceKind::Lan,
            Self::NatGateway(_) => ResourceKind::NatGateway,
            Self::NatGatewayRule(_) => ResourceKind::NatGatewayRule,
            Self::IpFailover(_) => ResourceKind::IpFailover,
            Self::NodePool(_) => ResourceKind::NodePool,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Datacenter(d) => d.id(),
            Self::Lan(d) => d.id(),
            Self::NatGateway(d) => d.id(),
            Self::NatGatewayRule(d) => d.id(),
            Self::IpFailover(d) => d.id(),
            Self::NodePool(d) => d.id(),
        }
    }
}

/// Run `$body` with `$r` bound to the reconciler and `$d` to the record
macro_rules! dispatch {
    ($engine:expr, $resource:expr, |$r:ident, $d:ident| $body:expr) => {
        match $resource {
            DesiredResource::Datacenter($d) => {
                let $r = &$engine.datacenters;
                $body
            }
            DesiredResource::Lan($d) => {
                let $r = &$engine.lans;
                $body
            }
            DesiredResource::NatGateway($d) => {
                let $r = &$engine.nat_gateways;
                $body
            }
            DesiredResource::NatGatewayRule($d) => {
                let $r = &$engine.nat_gateway_rules;
                $body
            }
            DesiredResource::IpFailover($d) => {
                let $r = &$engine.ip_failovers;
                $body
            }
            DesiredResource::NodePool($d) => {
                let $r = &$engine.node_pools;
                $body
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct Engine {
    datacenters: Reconciler<DatacenterAdapter>,
    lans: Reconciler<LanAdapter>,
    nat_gateways: Reconciler<NatGatewayAdapter>,
    nat_gateway_rules: Reconciler<NatGatewayRuleAdapter>,
    ip_failovers: Reconciler<IpFailoverAdapter>,
    node_pools: Reconciler<NodePoolAdapter>,
}

fn reconciler<A: ResourceAdapter>(
    adapter: A,
    poll: &PollSettings,
    overrides: &TimeoutOverrides,
) -> Reconciler<A> {
    let timeouts = Timeouts::for_kind(A::KIND).overridden_by(overrides);
    Reconciler::new(adapter, timeouts, *poll)
}

impl Engine {
    pub fn new(api: Arc<dyn CloudApi>, config: &EngineConfig) -> Self {
        Self::with_settings(api, &config.poll, &config.timeouts)
    }

    pub fn with_settings(
        api: Arc<dyn CloudApi>,
        poll: &PollSettings,
        overrides: &TimeoutOverrides,
    ) -> Self {
        Self {
            datacenters: reconciler(DatacenterAdapter::new(Arc::clone(&api)), poll, overrides),
            lans: reconciler(LanAdapter::new(Arc::clone(&api)), poll, overrides),
            nat_gateways: reconciler(NatGatewayAdapter::new(Arc::clone(&api)), poll, overrides),
            nat_gateway_rules: reconciler(
                NatGatewayRuleAdapter::new(Arc::clone(&api)),
                poll,
                overrides,
            ),
            ip_failovers: reconciler(IpFailoverAdapter::new(Arc::clone(&api)), poll, overrides),
            node_pools: reconciler(NodePoolAdapter::new(api), poll, overrides),
        }
    }

    /// Resolved budgets for `kind`
    #[must_use]
    pub fn timeouts(&self, kind: ResourceKind) -> &Timeouts {
        match kind {
            ResourceKind::Datacenter => self.datacenters.timeouts(),
            ResourceKind::Lan => self.lans.timeouts(),
            ResourceKind::NatGateway => self.nat_gateways.timeouts(),
            ResourceKind::NatGatewayRule => self.nat_gateway_rules.timeouts(),
            ResourceKind::IpFailover => self.ip_failovers.timeouts(),
            ResourceKind::NodePool => self.node_pools.timeouts(),
        }
    }

    /// # Errors
    ///
    /// See [`Reconciler::create`].
    pub async fn create(
        &self,
        resource: &mut DesiredResource,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        dispatch!(self, resource, |r, d| r.create(d, cancel).await.map(drop))
    }

    /// # Errors
    ///
    /// See [`Reconciler::update`].
    pub async fn update(
        &self,
        id: &str,
        resource: &mut DesiredResource,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        dispatch!(self, resource, |r, d| r.update(id, d, cancel).await.map(drop))
    }

    /// # Errors
    ///
    /// See [`Reconciler::delete`].
    pub async fn delete(
        &self,
        id: &str,
        resource: &DesiredResource,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        dispatch!(self, resource, |r, d| r.delete(id, d, cancel).await)
    }

    /// Create a record without an id, update one that has an id
    ///
    /// # Errors
    ///
    /// See [`Engine::create`] and [`Engine::update`].
    pub async fn apply(
        &self,
        resource: &mut DesiredResource,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        match resource.id().map(str::to_owned) {
            Some(id) => self.update(&id, resource, cancel).await,
            None => self.create(resource, cancel).await,
        }
    }
}
