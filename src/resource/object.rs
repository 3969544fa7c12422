//! # Remote Object
//!
//! Point-in-time read of a resource as the Cloud API reports it.

use super::RemoteStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side representation of a resource
///
/// `P` is the kind's typed property set. `entities` holds nested
/// collections the API embeds next to the properties (NAT gateway rules).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject<P> {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub properties: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<serde_json::Value>,
}

impl<P> RemoteObject<P> {
    #[must_use]
    pub fn status(&self) -> &RemoteStatus {
        &self.metadata.state
    }
}

/// Resource metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "missing_state")]
    pub state: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<DateTime<Utc>>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            state: missing_state(),
            etag: None,
            created_date: None,
            last_modified_date: None,
        }
    }
}

impl Metadata {
    #[must_use]
    pub fn with_state(state: RemoteStatus) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }
}

fn missing_state() -> RemoteStatus {
    RemoteStatus::Unknown(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Props {
        name: Option<String>,
    }

    #[test]
    fn test_deserializes_api_envelope() {
        let object: RemoteObject<Props> = serde_json::from_value(json!({
            "id": "dc-1",
            "type": "datacenter",
            "href": "https://api.ionos.com/cloudapi/v6/datacenters/dc-1",
            "metadata": {
                "etag": "45480eb3fbfc31f1d916c1eaa4abdcc3",
                "createdDate": "2015-12-04T14:34:09.809Z",
                "state": "AVAILABLE"
            },
            "properties": {"name": "prod"}
        }))
        .unwrap();
        assert_eq!(object.id, "dc-1");
        assert_eq!(object.status(), &RemoteStatus::Available);
        assert!(object.metadata.created_date.is_some());
        assert_eq!(object.properties.name.as_deref(), Some("prod"));
        assert!(object.entities.is_none());
    }

    #[test]
    fn test_missing_state_is_unknown() {
        let object: RemoteObject<Props> =
            serde_json::from_value(json!({"id": "x", "properties": {}})).unwrap();
        assert!(object.status().is_unknown());
    }
}
