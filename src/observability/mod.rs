//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//!
//! Logging goes through `tracing`; installing a subscriber is left to the
//! binary embedding this crate.

pub mod metrics;
