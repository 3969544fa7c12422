//! # Datacenter
//!
//! Virtual datacenters at `/datacenters/{id}`. The location cannot change
//! after creation.

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

/// Desired state of a datacenter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datacenter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sec_auth_protection: Option<bool>,
    /// Computed: incremented by the API on every change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Computed: features available at the location
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

/// Datacenter properties as the API reports them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sec_auth_protection: Option<bool>,
}

impl Identified for Datacenter {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

impl Projection<DatacenterProperties> for Datacenter {
    fn project(
        &mut self,
        remote: &RemoteObject<DatacenterProperties>,
    ) -> Result<(), ProjectionError> {
        let props = &remote.properties;
        self.location = required(
            ResourceKind::Datacenter,
            remote,
            "location",
            props.location.as_ref(),
        )?;
        assign(&mut self.name, props.name.as_ref());
        assign(&mut self.description, props.description.as_ref());
        assign(&mut self.sec_auth_protection, props.sec_auth_protection.as_ref());
        self.version = props.version;
        self.features = props.features.clone().unwrap_or_default();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DatacenterAdapter {
    api: Arc<dyn CloudApi>,
}

impl DatacenterAdapter {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }
}

fn writable(desired: &Datacenter) -> DatacenterProperties {
    DatacenterProperties {
        name: desired.name.clone(),
        description: desired.description.clone(),
        sec_auth_protection: desired.sec_auth_protection,
        ..DatacenterProperties::default()
    }
}

#[async_trait]
impl ResourceAdapter for DatacenterAdapter {
    type Desired = Datacenter;
    type Properties = DatacenterProperties;

    const KIND: ResourceKind = ResourceKind::Datacenter;

    fn api(&self) -> &dyn CloudApi {
        self.api.as_ref()
    }

    fn locate(&self, _desired: &Datacenter, id: &str) -> Locator {
        Locator::new(Self::KIND, Vec::new(), id)
    }

    async fn create(&self, desired: &Datacenter) -> Result<Submitted, ApiError> {
        let properties = DatacenterProperties {
            location: Some(desired.location.clone()),
            ..writable(desired)
        };
        let body = json!({ "properties": to_body(&properties)? });
        create_in(self.api(), Self::KIND, Vec::new(), body).await
    }

    async fn update(
        &self,
        locator: &Locator,
        desired: &Datacenter,
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
        current: &RemoteObject<DatacenterProperties>,
        desired: &Datacenter,
    ) -> UpdatePlan {
        let props = &current.properties;
        Diff::new()
            .replace(
                "location",
                Some(desired.location.as_str()),
                props.location.as_deref(),
            )
            .field("name", desired.name.as_deref(), props.name.as_deref())
            .field(
                "description",
                desired.description.as_deref(),
                props.description.as_deref(),
            )
            .field(
                "sec_auth_protection",
                desired.sec_auth_protection.as_ref(),
                props.sec_auth_protection.as_ref(),
            )
            .plan()
    }
}
