//! Common test utilities for integration tests
//!
//! Provides rustls setup for the Pact tests and `FakeCloud`, an in-memory
//! simulation of the Cloud API's asynchronous behaviour.

#![allow(dead_code, reason = "each test crate uses a different subset")]

use async_trait::async_trait;
use ionoscloud_reconciler::client::{ApiRequest, ApiResponse, Method};
use ionoscloud_reconciler::{ApiError, CloudApi};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const REQUESTS: &str = "https://fake.ionos.test/cloudapi/v6/requests";

/// Marks an object that disappears when this state is reached
const GONE: &str = "<gone>";

#[derive(Debug)]
struct Stored {
    id: String,
    properties: Value,
    /// States reported by successive reads, the last one repeats
    states: VecDeque<String>,
    version: u64,
}

#[derive(Debug)]
struct State {
    objects: BTreeMap<String, Stored>,
    requests: HashMap<String, VecDeque<String>>,
    request_script: Vec<String>,
    track_requests: bool,
    rollout: Vec<String>,
    stuck: bool,
    sticky_deletes: bool,
    interleave: bool,
    failures: Vec<(Method, String, u16)>,
    calls: Vec<(Method, String)>,
    ids: HashMap<String, u64>,
    next_request: u64,
}

/// Simulated Cloud API
///
/// - POST to a collection creates `<prefix>-<n>` (`lan-1`, `np-1`, ...).
/// - Mutations of node pools are resource-keyed; every other mutation
///   returns a request-status `Location` unless request tracking is off.
/// - New and modified objects walk through the rollout states before
///   settling on `AVAILABLE` (`ACTIVE` for node pools).
/// - PATCH merges the body into the stored properties, PUT merges its
///   `properties` object.
/// - Deleted node pools report `DESTROYING` once, then vanish. Other
///   objects vanish at once unless deletes are sticky.
#[derive(Debug)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                objects: BTreeMap::new(),
                requests: HashMap::new(),
                request_script: vec!["QUEUED".into(), "RUNNING".into(), "DONE".into()],
                track_requests: true,
                rollout: vec!["BUSY".into()],
                stuck: false,
                sticky_deletes: false,
                interleave: false,
                failures: Vec::new(),
                calls: Vec::new(),
                ids: HashMap::new(),
                next_request: 0,
            }),
        }
    }
}

fn is_node_pool(path: &str) -> bool {
    path.contains("/nodepools")
}

fn settled(path: &str) -> &'static str {
    if is_node_pool(path) {
        "ACTIVE"
    } else {
        "AVAILABLE"
    }
}

fn id_prefix(collection: &str) -> &str {
    match collection.rsplit('/').next().unwrap_or_default() {
        "datacenters" => "dc",
        "lans" => "lan",
        "natgateways" => "ng",
        "rules" => "rule",
        "nodepools" => "np",
        other => other,
    }
}

fn not_found(path: &str) -> ApiError {
    ApiError::from_response(
        404,
        &json!({
            "httpStatus": 404,
            "messages": [{"errorCode": "309", "message": format!("Resource does not exist: {path}")}]
        })
        .to_string(),
    )
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses every new request reports, in order
    pub fn with_request_script(self, statuses: &[&str]) -> Self {
        self.state.lock().unwrap().request_script =
            statuses.iter().map(ToString::to_string).collect();
        self
    }

    /// Return no `Location` header, so callers poll the resource itself
    pub fn without_request_tracking(self) -> Self {
        self.state.lock().unwrap().track_requests = false;
        self
    }

    /// States a created or modified object reports before settling
    pub fn with_rollout(self, states: &[&str]) -> Self {
        self.state.lock().unwrap().rollout = states.iter().map(ToString::to_string).collect();
        self
    }

    /// Every call yields to the scheduler before it is served, so
    /// concurrent callers interleave between their requests
    pub fn with_interleaving(self) -> Self {
        self.state.lock().unwrap().interleave = true;
        self
    }

    /// Objects created or modified from now on never settle
    pub fn set_stuck(&self, stuck: bool) {
        self.state.lock().unwrap().stuck = stuck;
    }

    /// Deletes are acknowledged but the object stays
    pub fn set_sticky_deletes(&self, sticky: bool) {
        self.state.lock().unwrap().sticky_deletes = sticky;
    }

    /// The next `method` request to exactly `path` fails with `status`
    pub fn fail_next(&self, method: Method, path: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method, path.to_string(), status));
    }

    /// Insert a settled object at `path`
    pub fn seed(&self, path: &str, properties: Value) {
        let (collection, id) = path.rsplit_once('/').unwrap_or_default();
        let id = id.to_string();
        let mut state = self.state.lock().unwrap();
        *state
            .ids
            .entry(id_prefix(collection).to_string())
            .or_insert(0) += 1;
        state.objects.insert(
            path.to_string(),
            Stored {
                id,
                properties,
                states: VecDeque::from([settled(path).to_string()]),
                version: 1,
            },
        );
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(path)
    }

    pub fn properties(&self, path: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(path)
            .map(|o| o.properties.clone())
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, p)| *m == method && p == path)
            .count()
    }

    /// Number of mutating calls of any kind
    pub fn mutations(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| *m != Method::Get)
            .count()
    }
}

impl State {
    fn progression(&self, path: &str, transitional: &[String]) -> VecDeque<String> {
        if self.stuck {
            let state = transitional.first().map_or("BUSY", String::as_str);
            return VecDeque::from([state.to_string()]);
        }
        transitional
            .iter()
            .cloned()
            .chain(std::iter::once(settled(path).to_string()))
            .collect()
    }

    fn respond(&mut self, path: &str) -> ApiResponse {
        let location = (self.track_requests && !is_node_pool(path)).then(|| {
            self.next_request += 1;
            let href = format!("{REQUESTS}/req-{}/status", self.next_request);
            self.requests
                .insert(href.clone(), self.request_script.iter().cloned().collect());
            href
        });
        ApiResponse {
            status: 202,
            location,
            body: Value::Null,
        }
    }

    fn envelope(object: &mut Stored) -> Option<Value> {
        let state = if object.states.len() > 1 {
            object.states.pop_front().unwrap_or_default()
        } else {
            object.states.front().cloned().unwrap_or_default()
        };
        if state == GONE {
            return None;
        }
        Some(json!({
            "id": object.id,
            "metadata": {"state": state, "etag": format!("etag-{}", object.version)},
            "properties": object.properties,
        }))
    }

    fn handle(&mut self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let path = request
            .path
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();

        if let Some(index) = self
            .failures
            .iter()
            .position(|(m, p, _)| *m == request.method && *p == path)
        {
            let (_, _, status) = self.failures.remove(index);
            return Err(ApiError::from_response(
                status,
                &json!({"httpStatus": status, "messages": [{"errorCode": "100", "message": "injected failure"}]})
                    .to_string(),
            ));
        }

        if path.starts_with(REQUESTS) {
            let statuses = self.requests.get_mut(&path).ok_or_else(|| not_found(&path))?;
            let status = if statuses.len() > 1 {
                statuses.pop_front().unwrap_or_default()
            } else {
                statuses.front().cloned().unwrap_or_default()
            };
            return Ok(ApiResponse {
                status: 200,
                location: None,
                body: json!({"id": "req", "metadata": {"status": status, "message": format!("request {status}")}}),
            });
        }

        match request.method {
            Method::Get => {
                let object = self.objects.get_mut(&path).ok_or_else(|| not_found(&path))?;
                match Self::envelope(object) {
                    Some(body) => Ok(ApiResponse {
                        status: 200,
                        location: None,
                        body,
                    }),
                    None => {
                        self.objects.remove(&path);
                        Err(not_found(&path))
                    }
                }
            }
            Method::Post => {
                let prefix = id_prefix(&path).to_string();
                let counter = self.ids.entry(prefix.clone()).or_insert(0);
                *counter += 1;
                let id = format!("{prefix}-{counter}");
                let item = format!("{path}/{id}");
                let properties = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("properties"))
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                let transitional = if is_node_pool(&path) {
                    vec!["DEPLOYING".to_string()]
                } else {
                    self.rollout.clone()
                };
                let states = self.progression(&item, &transitional);
                self.objects.insert(
                    item.clone(),
                    Stored {
                        id: id.clone(),
                        properties,
                        states,
                        version: 1,
                    },
                );
                let mut response = self.respond(&item);
                response.body = json!({"id": id, "metadata": {"state": "BUSY"}});
                Ok(response)
            }
            Method::Patch | Method::Put => {
                let transitional = if is_node_pool(&path) {
                    vec!["UPDATING".to_string()]
                } else {
                    self.rollout.clone()
                };
                let states = self.progression(&path, &transitional);
                let object = self.objects.get_mut(&path).ok_or_else(|| not_found(&path))?;
                let body = request.body.clone().unwrap_or(Value::Null);
                if request.method == Method::Put {
                    if let Some(properties) = body.get("properties") {
                        merge(&mut object.properties, properties);
                    }
                } else {
                    merge(&mut object.properties, &body);
                }
                object.states = states;
                object.version += 1;
                let id = object.id.clone();
                let mut response = self.respond(&path);
                response.body = json!({"id": id});
                Ok(response)
            }
            Method::Delete => {
                if !self.objects.contains_key(&path) {
                    return Err(not_found(&path));
                }
                if is_node_pool(&path) {
                    if let Some(object) = self.objects.get_mut(&path) {
                        object.states = VecDeque::from(["DESTROYING".to_string(), GONE.to_string()]);
                    }
                } else if !self.sticky_deletes {
                    self.objects.remove(&path);
                }
                Ok(self.respond(&path))
            }
        }
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let interleave = self.state.lock().unwrap().interleave;
        if interleave {
            tokio::task::yield_now().await;
        }
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push((request.method, request.path.split('?').next().unwrap_or_default().to_string()));
        state.handle(&request)
    }
}
