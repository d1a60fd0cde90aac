//! Resilience primitives for calls to unreliable dependencies.
//!
//! - [`with_timeout`]: race an operation against a deadline
//! - [`retry_with_backoff`]: re-invoke a failing operation with exponential backoff
//! - [`CircuitBreaker`]: stop calling a dependency that keeps failing
//! - [`ResiliencePolicy`]: all three around one call site
//!
//! The primitives are generic over the operation's error type. They only
//! introduce two errors of their own, [`TimeoutError`](crate::TimeoutError)
//! and [`CircuitOpenError`](crate::CircuitOpenError), which reach the caller
//! through `From` conversions.

mod circuit_breaker;
mod policy;
mod registry;
mod retry;
mod timeout;

pub use circuit_breaker::CircuitBreaker;
pub use policy::ResiliencePolicy;
pub use registry::BreakerRegistry;
pub use retry::retry_with_backoff;
pub use timeout::{with_timeout, with_timeout_detached};
