//! # LAN
//!
//! LANs at `/datacenters/{dc}/lans/{id}`. LAN ids are server-assigned
//! numeric strings.

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

/// One IP failover group entry of a LAN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpFailoverEntry {
    pub ip: String,
    pub nic_uuid: String,
}

/// Desired state of a LAN
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub datacenter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub public: bool,
    /// Cross-connect the LAN belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcc: Option<String>,
    /// Computed: failover groups, managed through `ip_failover` resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_failover: Vec<IpFailoverEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_failover: Option<Vec<IpFailoverEntry>>,
}

impl Identified for Lan {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

impl Projection<LanProperties> for Lan {
    fn project(&mut self, remote: &RemoteObject<LanProperties>) -> Result<(), ProjectionError> {
        let props = &remote.properties;
        self.public = required(ResourceKind::Lan, remote, "public", props.public.as_ref())?;
        assign(&mut self.name, props.name.as_ref());
        assign(&mut self.pcc, props.pcc.as_ref());
        replace_all(&mut self.ip_failover, props.ip_failover.as_ref());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LanAdapter {
    api: Arc<dyn CloudApi>,
}

impl LanAdapter {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }
}

fn writable(desired: &Lan) -> LanProperties {
    LanProperties {
        name: desired.name.clone(),
        public: Some(desired.public),
        pcc: desired.pcc.clone(),
        ip_failover: None,
    }
}

#[async_trait]
impl ResourceAdapter for LanAdapter {
    type Desired = Lan;
    type Properties = LanProperties;

    const KIND: ResourceKind = ResourceKind::Lan;

    fn api(&self) -> &dyn CloudApi {
        self.api.as_ref()
    }

    fn locate(&self, desired: &Lan, id: &str) -> Locator {
        Locator::new(Self::KIND, vec![desired.datacenter_id.clone()], id)
    }

    async fn create(&self, desired: &Lan) -> Result<Submitted, ApiError> {
        let body = json!({ "properties": to_body(&writable(desired))? });
        create_in(
            self.api(),
            Self::KIND,
            vec![desired.datacenter_id.clone()],
            body,
        )
        .await
    }

    async fn update(&self, locator: &Locator, desired: &Lan) -> Result<OperationHandle, ApiError> {
        let body = to_body(&writable(desired))?;
        let response = self
            .api()
            .execute(ApiRequest::patch(PathBuilder::item(locator), body))
            .await?;
        Ok(handle_for(&response, locator))
    }

    fn classify_update(&self, current: &RemoteObject<LanProperties>, desired: &Lan) -> UpdatePlan {
        let props = &current.properties;
        Diff::new()
            .field("name", desired.name.as_deref(), props.name.as_deref())
            .field("public", Some(&desired.public), props.public.as_ref())
            .field("pcc", desired.pcc.as_deref(), props.pcc.as_deref())
            .plan()
    }
}
