//! # Metrics
//!
//! Prometheus metrics for storage operations.
//!
//! ## Metrics Exposed
//!
//! - `crd_storage_operations_total` - Total number of key-value operations, by operation
//! - `crd_storage_operation_errors_total` - Failed operations, by operation and error kind
//! - `crd_storage_operation_duration_seconds` - Duration of key-value operations
//! - `crd_storage_provision_steps_total` - Provisioning steps, by step and outcome

use crate::error::ErrorKind;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crd_storage_operations_total",
            "Total number of key-value operations",
        ),
        &["operation"],
    )
    .expect("Failed to create OPERATIONS_TOTAL metric - this should never happen")
});

static OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crd_storage_operation_errors_total",
            "Total number of failed key-value operations",
        ),
        &["operation", "kind"],
    )
    .expect("Failed to create OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "crd_storage_operation_duration_seconds",
            "Duration of key-value operations in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create OPERATION_DURATION metric - this should never happen")
});

static PROVISION_STEPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crd_storage_provision_steps_total",
            "Total number of provisioning steps by outcome",
        ),
        &["step", "outcome"],
    )
    .expect("Failed to create PROVISION_STEPS_TOTAL metric - this should never happen")
});

/// Register all metrics with the crate registry
///
/// # Errors
///
/// Returns an error if a metric is registered twice.
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROVISION_STEPS_TOTAL.clone()))?;
    Ok(())
}

/// Render the registry in the Prometheus text exposition format
///
/// # Errors
///
/// Returns an error if encoding fails or the output is not UTF-8.
pub fn gather_text() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_operation(operation: &str, duration: f64) {
    OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn record_operation_error(operation: &str, kind: ErrorKind) {
    OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation, kind.as_str()])
        .inc();
}

pub fn record_provision_step(step: &str, outcome: &str) {
    PROVISION_STEPS_TOTAL
        .with_label_values(&[step, outcome])
        .inc();
}
