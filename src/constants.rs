//! # Constants
//!
//! Shared constants used throughout the engine.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default IONOS Cloud API endpoint
pub const DEFAULT_API_URL: &str = "https://api.ionos.com/cloudapi/v6";

/// Default per-request HTTP timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Default first wait between two status queries (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MIN_MS: u64 = 1_000;

/// Default cap on the wait between two status queries (milliseconds)
/// Infrastructure operations are short-lived, the interval never grows past this
pub const DEFAULT_POLL_INTERVAL_MAX_MS: u64 = 5_000;

/// Default budget for any lifecycle operation without an override (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60 * 60;

/// Default create/update/delete budget for Kubernetes node pools (seconds)
/// Node pool provisioning boots VMs and joins them to the cluster
pub const NODE_POOL_TIMEOUT_SECS: u64 = 3 * 60 * 60;

/// Default create budget for datacenters (seconds)
pub const DATACENTER_CREATE_TIMEOUT_SECS: u64 = 20 * 60;

/// Default budget for LAN, NAT gateway, rule and failover operations (seconds)
pub const NETWORK_TIMEOUT_SECS: u64 = 30 * 60;

/// Value of the `User-Agent` header sent with every API request
pub const USER_AGENT: &str = concat!("ionoscloud-reconciler/", env!("CARGO_PKG_VERSION"));

/// Tracing targets the configured log level applies to
pub const LOG_TARGETS: [&str; 2] = ["ionoscloud_reconciler", "ionos_reconcile"];
