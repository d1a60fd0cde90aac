//! Configuration types for the resilience primitives.
//!
//! This module provides configuration options for:
//! - [`RetryPolicy`]: Backoff retrier behaviour and retryable-error matchers
//! - [`CircuitBreakerConfig`]: Circuit breaker thresholds and cooldown
//! - [`TimeoutConfig`]: Deadline and message for the timeout racer
//! - [`ResilienceConfig`]: JSON document with defaults and per-dependency overrides

mod circuit_breaker;
mod retry;
mod settings;
mod timeout;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitEvent, CircuitState, CircuitStats};
pub use retry::{ErrorMatcher, RetryObserver, RetryPolicy};
pub use settings::{BreakerSettings, DependencySettings, ResilienceConfig, RetrySettings};
pub use timeout::TimeoutConfig;
