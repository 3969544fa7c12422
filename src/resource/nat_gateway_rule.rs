//! # NAT Gateway Rule
//!
//! Rules at `/datacenters/{dc}/natgateways/{ng}/rules/{id}`. A rule is
//! addressed by three ids.

use super::{
    create_in, handle_for, to_body, Diff, Identified, Locator, OperationHandle, RemoteObject,
    ResourceAdapter, ResourceKind, Submitted, UpdatePlan,
};
use crate::client::{ApiError, ApiRequest, CloudApi, PathBuilder};
use crate::reconciler::projector::{assign, required, Projection, ProjectionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NatRuleType {
    #[default]
    Snat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NatProtocol {
    Tcp,
    Udp,
    Icmp,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u16>,
}

/// Desired state of a NAT gateway rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NatGatewayRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub datacenter_id: String,
    pub nat_gateway_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<NatRuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<NatProtocol>,
    pub source_subnet: String,
    pub public_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port_range: Option<PortRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatGatewayRuleProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<NatRuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<NatProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port_range: Option<PortRange>,
}

impl Identified for NatGatewayRule {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

impl Projection<NatGatewayRuleProperties> for NatGatewayRule {
    fn project(
        &mut self,
        remote: &RemoteObject<NatGatewayRuleProperties>,
    ) -> Result<(), ProjectionError> {
        let props = &remote.properties;
        let kind = ResourceKind::NatGatewayRule;
        self.source_subnet =
            required(kind, remote, "source_subnet", props.source_subnet.as_ref())?;
        self.public_ip = required(kind, remote, "public_ip", props.public_ip.as_ref())?;
        assign(&mut self.name, props.name.as_ref());
        assign(&mut self.rule_type, props.rule_type.as_ref());
        assign(&mut self.protocol, props.protocol.as_ref());
        assign(&mut self.target_subnet, props.target_subnet.as_ref());
        assign(&mut self.target_port_range, props.target_port_range.as_ref());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NatGatewayRuleAdapter {
    api: Arc<dyn CloudApi>,
}

impl NatGatewayRuleAdapter {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }
}

fn parents(desired: &NatGatewayRule) -> Vec<String> {
    vec![desired.datacenter_id.clone(), desired.nat_gateway_id.clone()]
}

fn writable(desired: &NatGatewayRule) -> NatGatewayRuleProperties {
    NatGatewayRuleProperties {
        name: desired.name.clone(),
        rule_type: desired.rule_type,
        protocol: desired.protocol,
        source_subnet: Some(desired.source_subnet.clone()),
        public_ip: Some(desired.public_ip.clone()),
        target_subnet: desired.target_subnet.clone(),
        target_port_range: desired.target_port_range,
    }
}

#[async_trait]
impl ResourceAdapter for NatGatewayRuleAdapter {
    type Desired = NatGatewayRule;
    type Properties = NatGatewayRuleProperties;

    const KIND: ResourceKind = ResourceKind::NatGatewayRule;

    fn api(&self) -> &dyn CloudApi {
        self.api.as_ref()
    }

    fn locate(&self, desired: &NatGatewayRule, id: &str) -> Locator {
        Locator::new(Self::KIND, parents(desired), id)
    }

    async fn create(&self, desired: &NatGatewayRule) -> Result<Submitted, ApiError> {
        let body = json!({ "properties": to_body(&writable(desired))? });
        create_in(self.api(), Self::KIND, parents(desired), body).await
    }

    async fn update(
        &self,
        locator: &Locator,
        desired: &NatGatewayRule,
    ) -> Result<OperationHandle, ApiError> {
        let body = to_body(&writable(desired))?;
        let response = self
            .api()
            .execute(ApiRequest::patch(PathBuilder::item(locator), body))
            .await?;
        Ok(handle_for(&response, locator))
    }

    fn classify_update(
        &self,
        current: &RemoteObject<NatGatewayRuleProperties>,
        desired: &NatGatewayRule,
    ) -> UpdatePlan {
        let props = &current.properties;
        Diff::new()
            .field("name", desired.name.as_deref(), props.name.as_deref())
            .field("type", desired.rule_type.as_ref(), props.rule_type.as_ref())
            .field("protocol", desired.protocol.as_ref(), props.protocol.as_ref())
            .field(
                "source_subnet",
                Some(desired.source_subnet.as_str()),
                props.source_subnet.as_deref(),
            )
            .field(
                "public_ip",
                Some(desired.public_ip.as_str()),
                props.public_ip.as_deref(),
            )
            .field(
                "target_subnet",
                desired.target_subnet.as_deref(),
                props.target_subnet.as_deref(),
            )
            .field(
                "target_port_range",
                desired.target_port_range.as_ref(),
                props.target_port_range.as_ref(),
            )
            .plan()
    }
}
