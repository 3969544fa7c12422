//! # Cloud API Client
//!
//! Transport boundary of the engine. Resource adapters only talk to the
//! `CloudApi` trait; `IonosRestClient` is the production implementation.
//!
//! ## Modules
//!
//! - `rest` - reqwest-based client with token or basic auth
//! - `paths` - `PathBuilder` for collection and item paths
//! - `error` - `ApiError` with not-found and transient classification

pub mod error;
pub mod paths;
pub mod rest;

#[cfg(test)]
pub(crate) mod scripted;

pub use error::ApiError;
pub use paths::PathBuilder;
pub use rest::IonosRestClient;

use crate::resource::RemoteStatus;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;

/// HTTP method of an API request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API request
///
/// `path` is either relative to the API base URL or an absolute URL
/// (request-status hrefs returned in `Location` headers).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::with_body(Method::Post, path, body)
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::with_body(Method::Put, path, body)
    }

    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::with_body(Method::Patch, path, body)
    }

    fn with_body(method: Method, path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// A successful API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Request-status URL from the `Location` header, if any
    pub location: Option<String>,
    /// Parsed JSON body, `Null` when the body was empty
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        T::deserialize(&self.body).map_err(ApiError::from)
    }

    /// Location value when it points at a request-status resource
    #[must_use]
    pub fn request_href(&self) -> Option<&str> {
        self.location
            .as_deref()
            .filter(|href| href.contains("/requests/"))
    }

    /// Server-assigned id of the object in the body
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.body.get("id").and_then(serde_json::Value::as_str)
    }
}

/// Cloud API transport
///
/// Implementations must be safe for concurrent use; every lifecycle call
/// shares the same instance.
#[async_trait]
pub trait CloudApi: Send + Sync + fmt::Debug {
    /// Issue one request. Non-success responses are returned as `ApiError::Status`.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Status of an asynchronous API request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestStatus {
    #[serde(default)]
    pub id: Option<String>,
    pub metadata: RequestStatusMetadata,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestStatusMetadata {
    pub status: RemoteStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Read the status of a request from its status href
pub async fn request_status(api: &dyn CloudApi, href: &str) -> Result<RequestStatus, ApiError> {
    api.execute(ApiRequest::get(href)).await?.json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_href_only_accepts_request_urls() {
        let mut response = ApiResponse {
            status: 202,
            location: Some("https://api.ionos.com/cloudapi/v6/requests/abc/status".into()),
            body: json!({"id": "dc-1"}),
        };
        assert_eq!(
            response.request_href(),
            Some("https://api.ionos.com/cloudapi/v6/requests/abc/status")
        );
        assert_eq!(response.object_id(), Some("dc-1"));

        response.location = Some("https://api.ionos.com/cloudapi/v6/datacenters/dc-1".into());
        assert_eq!(response.request_href(), None);
    }

    #[test]
    fn test_request_status_deserializes_failure() {
        let status: RequestStatus = serde_json::from_value(json!({
            "id": "req-1",
            "metadata": {"status": "FAILED", "message": "quota exceeded"}
        }))
        .unwrap();
        assert_eq!(status.metadata.status, RemoteStatus::Failed);
        assert_eq!(status.metadata.message.as_deref(), Some("quota exceeded"));
    }
}
