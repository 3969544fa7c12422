//! # IP Failover Group
//!
//! A failover group is not an API object of its own: it is an
//! `{ip, nicUuid}` entry in the `ipFailover` list of a LAN. Every mutation
//! reads the LAN and PATCHes the whole list back. The NIC UUID identifies
//! the group within its LAN.
//!
//! Writes to one LAN are serialized per adapter: the read and the PATCH of
//! one group happen under the LAN's lock, so concurrent groups on the same
//! LAN never overwrite each other's entries.

use super::lan::{IpFailoverEntry, LanProperties};
use super::{
    handle_for, Diff, Identified, Locator, OperationHandle, RemoteObject, ResourceAdapter,
    ResourceKind, Submitted, UpdatePlan,
};
use crate::client::{ApiError, ApiRequest, CloudApi, PathBuilder};
use crate::reconciler::projector::{required, Projection, ProjectionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Desired state of an IP failover group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpFailover {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub datacenter_id: String,
    pub lan_id: String,
    pub nic_uuid: String,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpFailoverProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nic_uuid: Option<String>,
}

impl Identified for IpFailover {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

impl Projection<IpFailoverProperties> for IpFailover {
    fn project(
        &mut self,
        remote: &RemoteObject<IpFailoverProperties>,
    ) -> Result<(), ProjectionError> {
        let props = &remote.properties;
        let kind = ResourceKind::IpFailover;
        self.ip = required(kind, remote, "ip", props.ip.as_ref())?;
        self.nic_uuid = required(kind, remote, "nic_uuid", props.nic_uuid.as_ref())?;
        Ok(())
    }
}

/// Locks keyed by the LAN path
type LanLocks = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

#[derive(Debug, Clone)]
pub struct IpFailoverAdapter {
    api: Arc<dyn CloudApi>,
    locks: LanLocks,
}

fn missing_group(nic_uuid: &str, lan_id: &str) -> ApiError {
    ApiError::not_found(format!("no failover group for NIC {nic_uuid} in LAN {lan_id}"))
}

impl IpFailoverAdapter {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self {
            api,
            locks: LanLocks::default(),
        }
    }

    /// Exclusive access to the failover list of the LAN holding `locator`
    async fn lock_lan(&self, locator: &Locator) -> OwnedMutexGuard<()> {
        let lan = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(PathBuilder::item(locator)).or_default())
        };
        lan.lock_owned().await
    }

    async fn read_lan(&self, locator: &Locator) -> Result<RemoteObject<LanProperties>, ApiError> {
        self.api()
            .execute(ApiRequest::get(PathBuilder::item(locator)))
            .await?
            .json()
    }

    /// PATCH the LAN with a new failover list
    async fn write_groups(
        &self,
        locator: &Locator,
        groups: Vec<IpFailoverEntry>,
    ) -> Result<OperationHandle, ApiError> {
        let body = json!({ "ipFailover": groups });
        let response = self
            .api()
            .execute(ApiRequest::patch(PathBuilder::item(locator), body))
            .await?;
        Ok(handle_for(&response, locator))
    }

    /// Current groups with the entry for `nic_uuid` set to `ip`
    async fn upsert(
        &self,
        locator: &Locator,
        nic_uuid: &str,
        ip: &str,
    ) -> Result<OperationHandle, ApiError> {
        let _guard = self.lock_lan(locator).await;
        let lan = self.read_lan(locator).await?;
        let mut groups = lan.properties.ip_failover.unwrap_or_default();
        let entry = IpFailoverEntry {
            ip: ip.to_string(),
            nic_uuid: nic_uuid.to_string(),
        };
        match groups.iter_mut().find(|g| g.nic_uuid == nic_uuid) {
            Some(existing) => *existing = entry,
            None => groups.push(entry),
        }
        self.write_groups(locator, groups).await
    }
}

#[async_trait]
impl ResourceAdapter for IpFailoverAdapter {
    type Desired = IpFailover;
    type Properties = IpFailoverProperties;

    const KIND: ResourceKind = ResourceKind::IpFailover;

    fn api(&self) -> &dyn CloudApi {
        self.api.as_ref()
    }

    fn locate(&self, desired: &IpFailover, id: &str) -> Locator {
        Locator::new(
            Self::KIND,
            vec![desired.datacenter_id.clone(), desired.lan_id.clone()],
            id,
        )
    }

    async fn create(&self, desired: &IpFailover) -> Result<Submitted, ApiError> {
        let locator = self.locate(desired, &desired.nic_uuid);
        let handle = self.upsert(&locator, &desired.nic_uuid, &desired.ip).await?;
        Ok(Submitted { handle, locator })
    }

    async fn update(
        &self,
        locator: &Locator,
        desired: &IpFailover,
    ) -> Result<OperationHandle, ApiError> {
        self.upsert(locator, &locator.id, &desired.ip).await
    }

    async fn delete(&self, locator: &Locator) -> Result<OperationHandle, ApiError> {
        let _guard = self.lock_lan(locator).await;
        let lan = self.read_lan(locator).await?;
        let mut groups = lan.properties.ip_failover.unwrap_or_default();
        let before = groups.len();
        groups.retain(|g| g.nic_uuid != locator.id);
        if groups.len() == before {
            debug!("No failover group for NIC {} in LAN {}", locator.id, lan.id);
            return Err(missing_group(&locator.id, &lan.id));
        }
        self.write_groups(locator, groups).await
    }

    async fn find_by_id(
        &self,
        locator: &Locator,
    ) -> Result<RemoteObject<IpFailoverProperties>, ApiError> {
        let lan = self.read_lan(locator).await?;
        let entry = lan
            .properties
            .ip_failover
            .unwrap_or_default()
            .into_iter()
            .find(|g| g.nic_uuid == locator.id)
            .ok_or_else(|| missing_group(&locator.id, &lan.id))?;
        Ok(RemoteObject {
            id: entry.nic_uuid.clone(),
            metadata: lan.metadata,
            properties: IpFailoverProperties {
                ip: Some(entry.ip),
                nic_uuid: Some(entry.nic_uuid),
            },
            entities: None,
        })
    }

    fn classify_update(
        &self,
        current: &RemoteObject<IpFailoverProperties>,
        desired: &IpFailover,
    ) -> UpdatePlan {
        let props = &current.properties;
        Diff::new()
            .replace(
                "nic_uuid",
                Some(desired.nic_uuid.as_str()),
                props.nic_uuid.as_deref(),
            )
            .field("ip", Some(desired.ip.as_str()), props.ip.as_deref())
            .plan()
    }
}
