//! # Bulwark
//!
//! Resilience primitives for calls to unreliable dependencies: payment
//! providers, identity verification services, blockchain RPC nodes and
//! hosted databases.
//!
//! ## Quick Start
//!
//! ```rust
//! use bulwark::prelude::*;
//! use std::{sync::Arc, time::Duration};
//!
//! # tokio_test::block_on(async {
//! let breaker = Arc::new(CircuitBreaker::new(
//!     "contract-rpc",
//!     CircuitBreakerConfig::builder().failure_threshold(5).build(),
//! ));
//!
//! let policy = ResiliencePolicy::new("contract-rpc")
//!     .with_breaker(breaker)
//!     .with_retry(RetryPolicy::new().retry_on("network").retry_on(ErrorKind::Timeout))
//!     .with_timeout(Duration::from_secs(10));
//!
//! let receipt = policy
//!     .execute(|| async { Ok::<_, Error>("0x5f3a…") })
//!     .await?;
//! # assert_eq!(receipt, "0x5f3a…");
//! # Ok::<(), Error>(())
//! # });
//! ```
//!
//! ## Key Concepts
//!
//! - **Timeout racer**: [`with_timeout`] settles with whichever of the
//!   operation and the deadline finishes first
//! - **Backoff retrier**: [`retry_with_backoff`] re-invokes a failed operation
//!   after `base_delay * multiplier^(attempt-1)`, jittered and capped
//! - **Circuit breaker**: [`CircuitBreaker`] stops calling a dependency after
//!   consecutive failures and tries it again after a cooldown
//! - **Errors pass through**: the primitives never rewrite an operation's
//!   error; only [`TimeoutError`] and [`CircuitOpenError`] are introduced
//!
//! Resilience is opt-in per call site. Nothing is installed globally: build a
//! [`BreakerRegistry`] and [`monitoring::Metrics`] once and pass them where
//! they are needed.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod config;
pub mod error;
pub mod resilience;

// Observability
pub mod monitoring;

// Testing utilities
pub mod testing;

// Prelude for convenient imports
pub mod prelude;

// Re-export main types at crate root for convenience
pub use error::{
    CircuitOpenError, Classification, Classify, Error, ErrorClassifier, ErrorKind, Result,
    Severity, TimeoutError,
};
pub use resilience::{
    BreakerRegistry, CircuitBreaker, ResiliencePolicy, retry_with_backoff, with_timeout,
    with_timeout_detached,
};

// Re-export config types
pub use config::{
    CircuitBreakerConfig, CircuitEvent, CircuitState, CircuitStats, ErrorMatcher,
    ResilienceConfig, RetryPolicy, TimeoutConfig,
};
