//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types for easy importing:
//!
//! ```rust
//! use bulwark::prelude::*;
//! ```
//!
//! This provides access to:
//! - The three primitives and their composition
//! - Configuration types
//! - Error types

pub use crate::{
    config::{
        CircuitBreakerConfig, CircuitEvent, CircuitState, CircuitStats, ErrorMatcher,
        ResilienceConfig, RetryPolicy, TimeoutConfig,
    },
    error::{CircuitOpenError, Classify, Error, ErrorKind, Result, TimeoutError},
    monitoring::Metrics,
    resilience::{
        BreakerRegistry, CircuitBreaker, ResiliencePolicy, retry_with_backoff, with_timeout,
        with_timeout_detached,
    },
};
