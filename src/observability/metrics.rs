//! # Metrics
//!
//! Prometheus metrics for the reconciliation engine.
//!
//! ## Metrics Exposed
//!
//! - `ionos_reconcile_operations_total` - Lifecycle calls by kind, operation and outcome
//! - `ionos_reconcile_operation_errors_total` - Failed lifecycle calls by failure class
//! - `ionos_reconcile_operation_duration_seconds` - Wall time of lifecycle calls
//! - `ionos_reconcile_api_requests_total` - Cloud API requests by method and HTTP status
//! - `ionos_reconcile_api_request_duration_seconds` - Duration of Cloud API requests
//! - `ionos_reconcile_status_polls_total` - Status queries by observed status

use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ionos_reconcile_operations_total",
            "Total number of lifecycle calls by resource kind, operation and outcome",
        ),
        &["kind", "operation", "outcome"],
    )
    .expect("Failed to create OPERATIONS_TOTAL metric - this should never happen")
});

static OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ionos_reconcile_operation_errors_total",
            "Total number of failed lifecycle calls by failure class",
        ),
        &["kind", "operation", "failure"],
    )
    .expect("Failed to create OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "ionos_reconcile_operation_duration_seconds",
            "Duration of lifecycle calls in seconds",
        )
        .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
        &["kind", "operation"],
    )
    .expect("Failed to create OPERATION_DURATION metric - this should never happen")
});

static API_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ionos_reconcile_api_requests_total",
            "Total number of Cloud API requests by method and HTTP status",
        ),
        &["method", "status"],
    )
    .expect("Failed to create API_REQUESTS_TOTAL metric - this should never happen")
});

static API_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "ionos_reconcile_api_request_duration_seconds",
            "Duration of Cloud API requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method"],
    )
    .expect("Failed to create API_REQUEST_DURATION metric - this should never happen")
});

static STATUS_POLLS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ionos_reconcile_status_polls_total",
            "Total number of status queries by observed status",
        ),
        &["status"],
    )
    .expect("Failed to create STATUS_POLLS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(API_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(STATUS_POLLS_TOTAL.clone()))?;
    Ok(())
}

/// Render the registry in the Prometheus text format
#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only if the encoder rejects a metric family"
)]
pub fn gather_metrics() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_operation(kind: &str, operation: &str, outcome: &str, duration: f64) {
    OPERATIONS_TOTAL
        .with_label_values(&[kind, operation, outcome])
        .inc();
    OPERATION_DURATION
        .with_label_values(&[kind, operation])
        .observe(duration);
}

pub fn increment_operation_errors(kind: &str, operation: &str, failure: &str) {
    OPERATION_ERRORS_TOTAL
        .with_label_values(&[kind, operation, failure])
        .inc();
}

/// `status` is `None` when no HTTP response was received
pub fn record_api_request(method: &str, status: Option<u16>, duration: f64) {
    let status = status.map_or_else(|| "error".to_string(), |s| s.to_string());
    API_REQUESTS_TOTAL
        .with_label_values(&[method, status.as_str()])
        .inc();
    API_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration);
}

pub fn increment_status_polls(status: &str) {
    STATUS_POLLS_TOTAL.with_label_values(&[status]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation() {
        let before = OPERATIONS_TOTAL
            .with_label_values(&["lan", "create", "succeeded"])
            .get();
        record_operation("lan", "create", "succeeded", 12.0);
        let after = OPERATIONS_TOTAL
            .with_label_values(&["lan", "create", "succeeded"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_operation_errors() {
        let before = OPERATION_ERRORS_TOTAL
            .with_label_values(&["node_pool", "delete", "timeout"])
            .get();
        increment_operation_errors("node_pool", "delete", "timeout");
        let after = OPERATION_ERRORS_TOTAL
            .with_label_values(&["node_pool", "delete", "timeout"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_api_request_without_response_is_labelled_error() {
        let before = API_REQUESTS_TOTAL
            .with_label_values(&["GET", "error"])
            .get();
        record_api_request("GET", None, 0.2);
        let after = API_REQUESTS_TOTAL
            .with_label_values(&["GET", "error"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_status_polls() {
        let before = STATUS_POLLS_TOTAL.with_label_values(&["BUSY"]).get();
        increment_status_polls("BUSY");
        assert_eq!(
            STATUS_POLLS_TOTAL.with_label_values(&["BUSY"]).get(),
            before + 1u64
        );
    }

    #[test]
    fn test_register_and_gather() {
        assert!(register_metrics().is_ok());
        increment_status_polls("DONE");
        let text = gather_metrics().unwrap();
        assert!(text.contains("ionos_reconcile_status_polls_total"));
    }
}
