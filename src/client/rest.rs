//! # IONOS REST Client
//!
//! Native REST implementation of `CloudApi` for the IONOS Cloud API v6.
//! Uses reqwest with rustls (no OpenSSL dependencies).
//!
//! Works directly against Pact HTTP mock servers when `IONOS_API_URL`
//! points at one.
//!
//! References:
//! - [IONOS Cloud API v6](https://api.ionos.com/docs/cloud/v6/)

use super::{ApiError, ApiRequest, ApiResponse, CloudApi, Method};
use crate::config::{ConfigError, Credentials, EngineConfig};
use crate::constants::USER_AGENT;
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, warn};

/// IONOS Cloud API REST client
pub struct IonosRestClient {
    http_client: Client,
    base_url: String,
    credentials: Credentials,
}

impl std::fmt::Debug for IonosRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IonosRestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl IonosRestClient {
    /// Create a client from the engine configuration
    ///
    /// # Errors
    /// Returns an error if no credentials are configured or the HTTP client
    /// cannot be built
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let credentials = config.require_credentials()?.clone();

        // Create HTTP client with rustls (already configured in Cargo.toml)
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "IONOS_API_URL".to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        debug!("Initialized IONOS REST client for {}", config.api_url);

        Ok(Self {
            http_client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Absolute URL for a request path
    ///
    /// Absolute hrefs (request-status links) are passed through unchanged.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Build HTTP request with authentication headers
    fn make_request(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let url = self.url(&request.path);

        let builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Put => self.http_client.put(&url),
            Method::Patch => self.http_client.patch(&url),
            Method::Delete => self.http_client.delete(&url),
        };

        let builder = match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token.as_str()),
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password.as_str()))
            }
        };

        match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Handle IONOS API error responses
    fn handle_error_response(status: reqwest::StatusCode, error_text: &str) -> ApiError {
        let err = ApiError::from_response(status.as_u16(), error_text);
        if err.is_not_found() {
            debug!("IONOS API returned not found: {}", err);
        } else {
            warn!("IONOS API error: {}", err);
        }
        err
    }
}

fn location(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

#[async_trait]
impl CloudApi for IonosRestClient {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let start = Instant::now();
        let method = request.method;
        debug!("{} {}", method, request.path);

        let response = match self.make_request(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_api_request(method.as_str(), None, start.elapsed().as_secs_f64());
                warn!("{} {} failed before a response: {}", method, request.path, e);
                return Err(ApiError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        let location = location(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        metrics::record_api_request(
            method.as_str(),
            Some(status.as_u16()),
            start.elapsed().as_secs_f64(),
        );

        if !status.is_success() {
            return Err(Self::handle_error_response(status, &text));
        }

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            location,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    fn client(api_url: &str) -> IonosRestClient {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let config = EngineConfig {
            api_url: api_url.to_string(),
            credentials: Some(Credentials::Token(Zeroizing::new("t".to_string()))),
            ..EngineConfig::default()
        };
        IonosRestClient::new(&config).unwrap()
    }

    #[test]
    fn test_relative_paths_join_base_url() {
        let client = client("https://api.example.test/cloudapi/v6/");
        assert_eq!(
            client.url("/datacenters/dc-1"),
            "https://api.example.test/cloudapi/v6/datacenters/dc-1"
        );
        assert_eq!(
            client.url("datacenters"),
            "https://api.example.test/cloudapi/v6/datacenters"
        );
    }

    #[test]
    fn test_absolute_hrefs_pass_through() {
        let client = client("https://api.example.test/cloudapi/v6");
        let href = "https://other.example.test/cloudapi/v6/requests/r-1/status";
        assert_eq!(client.url(href), href);
    }

    #[test]
    fn test_new_requires_credentials() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let err = IonosRestClient::new(&EngineConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let rendered = format!("{:?}", client("https://api.example.test"));
        assert!(rendered.contains("api.example.test"));
        assert!(!rendered.contains("Token"));
    }
}
