//! # Kubernetes Node Pool
//!
//! Node pools at `/k8s/{cluster}/nodepools/{id}`, updated with PUT.
//!
//! The k8s endpoints do not hand out request-status links, so every
//! operation is polled through the pool's own `metadata.state`
//! (`DEPLOYING`, `UPDATING`, `DESTROYING`, then `ACTIVE` or `FAILED`).
//!
//! The VM shape of a pool (datacenter, CPU family, cores, RAM, zone and
//! storage) is fixed at creation. Changing any of it replaces the pool.

use super::{
    to_body, Diff, Identified, Locator, OperationHandle, RemoteObject, RemoteStatus,
    ResourceAdapter, ResourceKind, Submitted, UpdatePlan,
};
use crate::client::{ApiError, ApiRequest, CloudApi, PathBuilder};
use crate::reconciler::projector::{assign, replace_all, required, Projection, ProjectionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    #[serde(alias = "day_of_the_week")]
    pub day_of_the_week: String,
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoScaling {
    #[serde(alias = "min_node_count")]
    pub min_node_count: u32,
    #[serde(alias = "max_node_count")]
    pub max_node_count: u32,
}

/// LAN attached to every node of the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolLan {
    pub id: u32,
    #[serde(default = "dhcp_default")]
    pub dhcp: bool,
}

fn dhcp_default() -> bool {
    true
}

/// Desired state of a node pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub k8s_cluster_id: String,
    pub datacenter_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<AutoScaling>,
    pub node_count: u32,
    pub cpu_family: String,
    pub cores_count: u32,
    pub ram_size: u32,
    pub availability_zone: String,
    pub storage_type: String,
    pub storage_size: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lans: Vec<NodePoolLan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<AutoScaling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lans: Option<Vec<NodePoolLan>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ips: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Identified for NodePool {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

impl Projection<NodePoolProperties> for NodePool {
    fn project(
        &mut self,
        remote: &RemoteObject<NodePoolProperties>,
    ) -> Result<(), ProjectionError> {
        let p = &remote.properties;
        let kind = ResourceKind::NodePool;
        self.name = required(kind, remote, "name", p.name.as_ref())?;
        self.datacenter_id = required(kind, remote, "datacenter_id", p.datacenter_id.as_ref())?;
        self.node_count = required(kind, remote, "node_count", p.node_count.as_ref())?;
        self.cpu_family = required(kind, remote, "cpu_family", p.cpu_family.as_ref())?;
        self.cores_count = required(kind, remote, "cores_count", p.cores_count.as_ref())?;
        self.ram_size = required(kind, remote, "ram_size", p.ram_size.as_ref())?;
        self.availability_zone =
            required(kind, remote, "availability_zone", p.availability_zone.as_ref())?;
        self.storage_type = required(kind, remote, "storage_type", p.storage_type.as_ref())?;
        self.storage_size = required(kind, remote, "storage_size", p.storage_size.as_ref())?;
        assign(&mut self.k8s_version, p.k8s_version.as_ref());
        assign(&mut self.maintenance_window, p.maintenance_window.as_ref());
        assign(&mut self.auto_scaling, p.auto_scaling.as_ref());
        replace_all(&mut self.lans, p.lans.as_ref());
        replace_all(&mut self.public_ips, p.public_ips.as_ref());
        self.labels = p.labels.clone().unwrap_or_default();
        self.annotations = p.annotations.clone().unwrap_or_default();
        Ok(())
    }
}

/// Major.minor part of a Kubernetes version
fn minor_version(version: &str) -> &str {
    let mut dots = version.match_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((second, _))) => &version[..second],
        _ => version,
    }
}

/// Desired k8s version, `None` when it differs from the remote only by patch level
fn effective_version<'a>(desired: Option<&'a str>, remote: Option<&str>) -> Option<&'a str> {
    match (desired, remote) {
        (Some(d), Some(r)) if minor_version(d) == minor_version(r) => None,
        (d, _) => d,
    }
}

#[derive(Debug, Clone)]
pub struct NodePoolAdapter {
    api: Arc<dyn CloudApi>,
}

impl NodePoolAdapter {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }
}

/// Fields a PUT may change, the k8s version measured against `running`
fn updatable(desired: &NodePool, running: Option<&str>) -> NodePoolProperties {
    NodePoolProperties {
        name: Some(desired.name.clone()),
        k8s_version: effective_version(desired.k8s_version.as_deref(), running)
            .map(ToString::to_string),
        maintenance_window: desired.maintenance_window.clone(),
        auto_scaling: desired.auto_scaling,
        node_count: Some(desired.node_count),
        lans: Some(desired.lans.clone()),
        public_ips: Some(desired.public_ips.clone()),
        labels: Some(desired.labels.clone()),
        annotations: Some(desired.annotations.clone()),
        ..NodePoolProperties::default()
    }
}

#[async_trait]
impl ResourceAdapter for NodePoolAdapter {
    type Desired = NodePool;
    type Properties = NodePoolProperties;

    const KIND: ResourceKind = ResourceKind::NodePool;

    fn api(&self) -> &dyn CloudApi {
        self.api.as_ref()
    }

    fn locate(&self, desired: &NodePool, id: &str) -> Locator {
        Locator::new(Self::KIND, vec![desired.k8s_cluster_id.clone()], id)
    }

    async fn create(&self, desired: &NodePool) -> Result<Submitted, ApiError> {
        let properties = NodePoolProperties {
            datacenter_id: Some(desired.datacenter_id.clone()),
            cpu_family: Some(desired.cpu_family.clone()),
            cores_count: Some(desired.cores_count),
            ram_size: Some(desired.ram_size),
            availability_zone: Some(desired.availability_zone.clone()),
            storage_type: Some(desired.storage_type.clone()),
            storage_size: Some(desired.storage_size),
            ..updatable(desired, None)
        };
        let parents = vec![desired.k8s_cluster_id.clone()];
        let response = self
            .api()
            .execute(ApiRequest::post(
                PathBuilder::collection(Self::KIND, &parents),
                json!({ "properties": to_body(&properties)? }),
            ))
            .await?;
        let id = response
            .object_id()
            .ok_or_else(|| ApiError::Decode("node pool create response carries no id".into()))?;
        let locator = Locator::new(Self::KIND, parents, id);
        Ok(Submitted {
            handle: OperationHandle::Resource(locator.clone()),
            locator,
        })
    }

    async fn update(
        &self,
        locator: &Locator,
        desired: &NodePool,
    ) -> Result<OperationHandle, ApiError> {
        let current = self.find_by_id(locator).await?;
        let running = current.properties.k8s_version.as_deref();
        let body = json!({ "properties": to_body(&updatable(desired, running))? });
        self.api()
            .execute(ApiRequest::put(PathBuilder::item(locator), body))
            .await?;
        Ok(OperationHandle::Resource(locator.clone()))
    }

    async fn delete(&self, locator: &Locator) -> Result<OperationHandle, ApiError> {
        self.api()
            .execute(ApiRequest::delete(PathBuilder::item(locator)))
            .await?;
        Ok(OperationHandle::Resource(locator.clone()))
    }

    fn is_terminal(&self, status: &RemoteStatus) -> bool {
        matches!(status, RemoteStatus::Active | RemoteStatus::Failed)
    }

    fn is_success(&self, status: &RemoteStatus) -> bool {
        matches!(status, RemoteStatus::Active)
    }

    fn classify_update(
        &self,
        current: &RemoteObject<NodePoolProperties>,
        desired: &NodePool,
    ) -> UpdatePlan {
        let p = &current.properties;
        let mut diff = Diff::new();
        diff.replace(
            "datacenter_id",
            Some(desired.datacenter_id.as_str()),
            p.datacenter_id.as_deref(),
        )
        .replace(
            "cpu_family",
            Some(desired.cpu_family.as_str()),
            p.cpu_family.as_deref(),
        )
        .replace("cores_count", Some(&desired.cores_count), p.cores_count.as_ref())
        .replace("ram_size", Some(&desired.ram_size), p.ram_size.as_ref())
        .replace(
            "availability_zone",
            Some(desired.availability_zone.as_str()),
            p.availability_zone.as_deref(),
        )
        .replace(
            "storage_type",
            Some(desired.storage_type.as_str()),
            p.storage_type.as_deref(),
        )
        .replace("storage_size", Some(&desired.storage_size), p.storage_size.as_ref())
        .field("name", Some(desired.name.as_str()), p.name.as_deref())
        .field(
            "k8s_version",
            effective_version(desired.k8s_version.as_deref(), p.k8s_version.as_deref()),
            p.k8s_version.as_deref(),
        )
        .field(
            "maintenance_window",
            desired.maintenance_window.as_ref(),
            p.maintenance_window.as_ref(),
        )
        .field("auto_scaling", desired.auto_scaling.as_ref(), p.auto_scaling.as_ref())
        .field("lans", Some(desired.lans.as_slice()), p.lans.as_deref())
        .field(
            "public_ips",
            Some(desired.public_ips.as_slice()),
            p.public_ips.as_deref(),
        )
        .field("labels", Some(&desired.labels), p.labels.as_ref().or(Some(&BTreeMap::new())))
        .field(
            "annotations",
            Some(&desired.annotations),
            p.annotations.as_ref().or(Some(&BTreeMap::new())),
        );
        // The autoscaler owns the node count while autoscaling is on
        if desired.auto_scaling.is_none() {
            diff.field("node_count", Some(&desired.node_count), p.node_count.as_ref());
        }
        diff.plan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::scripted::ScriptedApi;
    use crate::client::Method;

    fn remote_json() -> serde_json::Value {
        json!({
            "id": "np-1",
            "metadata": {"state": "ACTIVE"},
            "properties": {
                "name": "pool",
                "datacenterId": "dc",
                "k8sVersion": "1.20.8",
                "maintenanceWindow": {"dayOfTheWeek": "Monday", "time": "09:00:00Z"},
                "nodeCount": 1,
                "cpuFamily": "AMD_OPTERON",
                "coresCount": 2,
                "ramSize": 2048,
                "availabilityZone": "AUTO",
                "storageType": "SSD",
                "storageSize": 40,
                "lans": [{"id": 3, "dhcp": false}, {"id": 1, "dhcp": true}],
                "publicIps": ["203.0.113.1", "203.0.113.2"]
            }
        })
    }

    fn converged() -> (RemoteObject<NodePoolProperties>, NodePool) {
        let remote: RemoteObject<NodePoolProperties> =
            serde_json::from_value(remote_json()).unwrap();
        let mut desired = NodePool {
            k8s_cluster_id: "k8s".to_string(),
            ..NodePool::default()
        };
        desired.project(&remote).unwrap();
        (remote, desired)
    }

    #[test]
    fn test_minor_version() {
        assert_eq!(minor_version("1.20.8"), "1.20");
        assert_eq!(minor_version("1.20"), "1.20");
        assert_eq!(minor_version("1"), "1");
    }

    #[test]
    fn test_projection_then_classify_is_no_change() {
        let (remote, desired) = converged();
        assert_eq!(desired.lans[0].id, 3);
        assert!(!desired.lans[0].dhcp);
        let adapter = NodePoolAdapter::new(Arc::new(ScriptedApi::new()));
        assert_eq!(adapter.classify_update(&remote, &desired), UpdatePlan::NoChange);
    }

    #[test]
    fn test_cpu_family_change_requires_replacement() {
        let (remote, mut desired) = converged();
        desired.cpu_family = "INTEL_SKYLAKE".to_string();
        desired.name = "renamed".to_string();
        let adapter = NodePoolAdapter::new(Arc::new(ScriptedApi::new()));
        assert_eq!(
            adapter.classify_update(&remote, &desired),
            UpdatePlan::RequiresReplacement {
                fields: vec!["cpu_family"]
            }
        );
    }

    #[test]
    fn test_patch_level_version_difference_is_suppressed() {
        let (remote, mut desired) = converged();
        let adapter = NodePoolAdapter::new(Arc::new(ScriptedApi::new()));
        desired.k8s_version = Some("1.20.9".to_string());
        assert_eq!(adapter.classify_update(&remote, &desired), UpdatePlan::NoChange);
        desired.k8s_version = Some("1.21.2".to_string());
        assert_eq!(adapter.classify_update(&remote, &desired), UpdatePlan::InPlace);
    }

    #[test]
    fn test_node_count_ignored_under_autoscaling() {
        let (remote, mut desired) = converged();
        let adapter = NodePoolAdapter::new(Arc::new(ScriptedApi::new()));
        desired.node_count = 2;
        assert_eq!(adapter.classify_update(&remote, &desired), UpdatePlan::InPlace);
        desired.auto_scaling = Some(AutoScaling {
            min_node_count: 1,
            max_node_count: 3,
        });
        // auto_scaling itself is a change, node_count no longer is
        let mut without_scaling_change = remote.clone();
        without_scaling_change.properties.auto_scaling = desired.auto_scaling;
        assert_eq!(
            adapter.classify_update(&without_scaling_change, &desired),
            UpdatePlan::NoChange
        );
    }

    #[test]
    fn test_status_predicates() {
        let adapter = NodePoolAdapter::new(Arc::new(ScriptedApi::new()));
        assert!(adapter.is_terminal(&RemoteStatus::Active));
        assert!(adapter.is_success(&RemoteStatus::Active));
        assert!(adapter.is_terminal(&RemoteStatus::Failed));
        assert!(!adapter.is_success(&RemoteStatus::Failed));
        for pending in [
            RemoteStatus::Deploying,
            RemoteStatus::Updating,
            RemoteStatus::Destroying,
            RemoteStatus::Available,
        ] {
            assert!(!adapter.is_terminal(&pending), "{pending}");
        }
    }

    #[tokio::test]
    async fn test_create_is_resource_keyed_even_with_location() {
        let api = Arc::new(ScriptedApi::new());
        api.accepted(
            Method::Post,
            "/k8s/k8s/nodepools",
            json!({"id": "np-1"}),
            "https://api.example.test/requests/r-1/status",
        );
        let adapter = NodePoolAdapter::new(Arc::clone(&api) as Arc<dyn CloudApi>);
        let (_, desired) = converged();
        let submitted = adapter.create(&desired).await.unwrap();
        assert_eq!(
            submitted.handle,
            OperationHandle::Resource(submitted.locator.clone())
        );
        let body = api.calls()[0].body.clone().unwrap();
        assert_eq!(body["properties"]["cpuFamily"], json!("AMD_OPTERON"));
        assert_eq!(body["properties"]["lans"][0], json!({"id": 3, "dhcp": false}));
    }

    fn scripted_pool() -> (Arc<ScriptedApi>, NodePoolAdapter, Locator) {
        let api = Arc::new(ScriptedApi::new());
        api.ok(Method::Get, "/k8s/k8s/nodepools/np-1", remote_json());
        api.ok(Method::Put, "/k8s/k8s/nodepools/np-1", json!({"id": "np-1"}));
        let adapter = NodePoolAdapter::new(Arc::clone(&api) as Arc<dyn CloudApi>);
        let locator = Locator::new(ResourceKind::NodePool, vec!["k8s".to_string()], "np-1");
        (api, adapter, locator)
    }

    fn put_body(api: &ScriptedApi) -> serde_json::Value {
        api.calls()
            .into_iter()
            .find(|c| c.method == Method::Put)
            .and_then(|c| c.body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_sends_new_name() {
        let (api, adapter, locator) = scripted_pool();
        let (remote, mut desired) = converged();
        desired.name = "renamed".to_string();
        assert_eq!(adapter.classify_update(&remote, &desired), UpdatePlan::InPlace);

        adapter.update(&locator, &desired).await.unwrap();
        assert_eq!(put_body(&api)["properties"]["name"], json!("renamed"));
    }

    #[tokio::test]
    async fn test_update_omits_patch_level_version_change() {
        let (api, adapter, locator) = scripted_pool();
        let (_, mut desired) = converged();
        desired.k8s_version = Some("1.20.9".to_string());
        desired.labels.insert("team".to_string(), "edge".to_string());

        adapter.update(&locator, &desired).await.unwrap();
        let properties = put_body(&api)["properties"].clone();
        assert!(properties.get("k8sVersion").is_none(), "{properties}");
        assert_eq!(properties["labels"], json!({"team": "edge"}));
    }

    #[tokio::test]
    async fn test_update_sends_minor_version_upgrade() {
        let (api, adapter, locator) = scripted_pool();
        let (_, mut desired) = converged();
        desired.k8s_version = Some("1.21.2".to_string());

        adapter.update(&locator, &desired).await.unwrap();
        assert_eq!(put_body(&api)["properties"]["k8sVersion"], json!("1.21.2"));
        assert_eq!(api.count(Method::Get, "/k8s/k8s/nodepools/np-1"), 1);
    }
}
