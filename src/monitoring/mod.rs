//! Monitoring for guarded calls.
//!
//! This module provides:
//!
//! - [`Metrics`]: shared atomic counters for calls, failures, retries,
//!   timeouts, circuit rejections and latency, in total and per operation
//! - [`instrument`]: wraps an operation factory so each call is recorded
//!
//! A [`ResiliencePolicy`](crate::ResiliencePolicy) records into a collector
//! given to [`with_metrics`](crate::ResiliencePolicy::with_metrics).
//! Nothing is exported anywhere; read [`Metrics::snapshot`] and serve it
//! however the application likes.

mod instrument;
mod metrics;

pub use instrument::{Instrumented, instrument};
pub use metrics::{Counter, Metrics, MetricsConfig, MetricsSnapshot, OperationSnapshot};
