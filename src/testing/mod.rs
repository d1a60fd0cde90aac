//! Testing utilities.
//!
//! - [`ScriptedOperation`]: an operation that fails or succeeds on a fixed
//!   schedule and counts how often it was called
//!
//! ## Quick Start
//!
//! ```rust
//! use bulwark::{CircuitBreaker, ErrorKind, testing::ScriptedOperation};
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::with_defaults("payments");
//! let op = ScriptedOperation::<()>::failing(ErrorKind::Payment, "card declined");
//!
//! assert!(breaker.execute(|| op.call()).await.is_err());
//! assert_eq!(op.calls(), 1);
//! # });
//! ```

mod scripted;

pub use scripted::ScriptedOperation;
