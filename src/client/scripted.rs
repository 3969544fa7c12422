//! Scripted in-memory `CloudApi` for unit tests.
//!
//! Responses are queued per `(method, path)`. The last queued response for a
//! route repeats once the queue is drained, so a single `DONE` keeps answering.

use super::{ApiError, ApiRequest, ApiResponse, CloudApi, Method};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Route = (Method, String);

#[derive(Debug, Default)]
pub(crate) struct ScriptedApi {
    routes: Mutex<HashMap<Route, VecDeque<Result<ApiResponse, ApiError>>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(&self, method: Method, path: &str, response: Result<ApiResponse, ApiError>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub(crate) fn ok(&self, method: Method, path: &str, body: Value) {
        self.on(method, path, Ok(ok(body)));
    }

    pub(crate) fn accepted(&self, method: Method, path: &str, body: Value, request_href: &str) {
        self.on(
            method,
            path,
            Ok(ApiResponse {
                status: 202,
                location: Some(request_href.to_string()),
                body,
            }),
        );
    }

    pub(crate) fn fail(&self, method: Method, path: &str, status: u16) {
        self.on(
            method,
            path,
            Err(ApiError::Status {
                status,
                code: None,
                message: format!("scripted {status}"),
            }),
        );
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

pub(crate) fn ok(body: Value) -> ApiResponse {
    ApiResponse {
        status: 200,
        location: None,
        body,
    }
}

#[async_trait]
impl CloudApi for ScriptedApi {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.calls.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(request.method, request.path.clone())) else {
            return Err(ApiError::Status {
                status: 400,
                code: None,
                message: format!("unscripted request {} {}", request.method, request.path),
            });
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}
