//! # NAT Gateway
//!
//! NAT gateways at `/datacenters/{dc}/natgateways/{id}`. The gateway is read
//! with `depth=2` so its rule list comes back embedded under
//! `entities.rules.items`.

use super::nat_gateway_rule::NatGatewayRuleProperties;
use super::{
    create_in, handle_for, to_body, Diff, Identified, Locator, OperationHandle, RemoteObject,
    ResourceAdapter, ResourceKind, Submitted, UpdatePlan,
};
use crate::client::{ApiError, ApiRequest, CloudApi, PathBuilder};
use crate::reconciler::projector::{assign, replace_all, required, Projection, ProjectionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// LAN the gateway is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatGatewayLan {
    /// Numeric LAN id
    pub id: u32,
    #[serde(
        default,
        rename = "gatewayIps",
        alias = "gateway_ips",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub gateway_ips: Vec<String>,
}

/// Rule embedded in the gateway read-back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatGatewayRuleSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

/// Desired state of a NAT gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NatGateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub datacenter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub public_ips: Vec<String>,
    #[serde(default)]
    pub lans: Vec<NatGatewayLan>,
    /// Computed: rules currently attached, in API order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<NatGatewayRuleSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatGatewayProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ips: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lans: Option<Vec<NatGatewayLan>>,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    rules: Option<RuleCollection>,
}

#[derive(Debug, Default, Deserialize)]
struct RuleCollection {
    #[serde(default)]
    items: Vec<RemoteObject<NatGatewayRuleProperties>>,
}

/// Rules embedded in a gateway read-back, in API order
fn embedded_rules(
    remote: &RemoteObject<NatGatewayProperties>,
) -> Result<Vec<NatGatewayRuleSummary>, ProjectionError> {
    let Some(entities) = &remote.entities else {
        return Ok(Vec::new());
    };
    let entities =
        Entities::deserialize(entities).map_err(|_parse_error| ProjectionError {
            kind: ResourceKind::NatGateway,
            id: remote.id.clone(),
            field: "entities.rules",
        })?;
    Ok(entities
        .rules
        .unwrap_or_default()
        .items
        .into_iter()
        .map(|rule| NatGatewayRuleSummary {
            id: rule.id,
            name: rule.properties.name,
            source_subnet: rule.properties.source_subnet,
            public_ip: rule.properties.public_ip,
        })
        .collect())
}

impl Identified for NatGateway {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

impl Projection<NatGatewayProperties> for NatGateway {
    fn project(
        &mut self,
        remote: &RemoteObject<NatGatewayProperties>,
    ) -> Result<(), ProjectionError> {
        let props = &remote.properties;
        self.public_ips = required(
            ResourceKind::NatGateway,
            remote,
            "public_ips",
            props.public_ips.as_ref(),
        )?;
        assign(&mut self.name, props.name.as_ref());
        replace_all(&mut self.lans, props.lans.as_ref());
        self.rules = embedded_rules(remote)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NatGatewayAdapter {
    api: Arc<dyn CloudApi>,
}

impl NatGatewayAdapter {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }
}

fn writable(desired: &NatGateway) -> NatGatewayProperties {
    NatGatewayProperties {
        name: desired.name.clone(),
        public_ips: Some(desired.public_ips.clone()),
        lans: Some(desired.lans.clone()),
    }
}

#[async_trait]
impl ResourceAdapter for NatGatewayAdapter {
    type Desired = NatGateway;
    type Properties = NatGatewayProperties;

    const KIND: ResourceKind = ResourceKind::NatGateway;

    fn api(&self) -> &dyn CloudApi {
        self.api.as_ref()
    }

    fn locate(&self, desired: &NatGateway, id: &str) -> Locator {
        Locator::new(Self::KIND, vec![desired.datacenter_id.clone()], id)
    }

    async fn create(&self, desired: &NatGateway) -> Result<Submitted, ApiError> {
        let body = json!({ "properties": to_body(&writable(desired))? });
        create_in(
            self.api(),
            Self::KIND,
            vec![desired.datacenter_id.clone()],
            body,
        )
        .await
    }

    async fn update(
        &self,
        locator: &Locator,
        desired: &NatGateway,
    ) -> Result<OperationHandle, ApiError> {
        let body = to_body(&writable(desired))?;
        let response = self
            .api()
            .execute(ApiRequest::patch(PathBuilder::item(locator), body))
            .await?;
        Ok(handle_for(&response, locator))
    }

    async fn find_by_id(
        &self,
        locator: &Locator,
    ) -> Result<RemoteObject<NatGatewayProperties>, ApiError> {
        let path = format!("{}?depth=2", PathBuilder::item(locator));
        self.api().execute(ApiRequest::get(path)).await?.json()
    }

    fn classify_update(
        &self,
        current: &RemoteObject<NatGatewayProperties>,
        desired: &NatGateway,
    ) -> UpdatePlan {
        let props = &current.properties;
        Diff::new()
            .field("name", desired.name.as_deref(), props.name.as_deref())
            .field(
                "public_ips",
                Some(desired.public_ips.as_slice()),
                props.public_ips.as_deref(),
            )
            .field(
                "lans",
                Some(desired.lans.as_slice()),
                props.lans.as_deref(),
            )
            .plan()
    }
}
