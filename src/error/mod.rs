//! Error types for guarded calls.
//!
//! - [`Error`]: general-purpose error with an [`ErrorKind`] category
//! - [`TimeoutError`]: raised by the timeout racer when the deadline wins
//! - [`CircuitOpenError`]: raised by a breaker that short-circuits a call
//! - [`ErrorClassifier`]: explicit rule table mapping messages to kinds
//!
//! ## Key Invariant
//!
//! The primitives never rewrite the caller's errors. Only the two synthetic
//! errors are introduced, and they reach the caller through
//! `From<TimeoutError>` / `From<CircuitOpenError>` on the caller's error type.
//!
//! ```rust,ignore
//! // Downstream error: propagated unchanged
//! let err = breaker.execute(|| provider.charge(&card)).await.unwrap_err();
//!
//! // Breaker rejection: distinguishable by kind
//! if err.kind() == ErrorKind::CircuitOpen {
//!     show_banner(err.user_message());
//! }
//! ```

mod classify;
mod core;
mod kind;
mod synthetic;

pub use classify::{Classification, ClassificationRule, Classify, ErrorClassifier, Severity};
pub use self::core::Error;
pub use kind::ErrorKind;
pub use synthetic::{CircuitOpenError, TimeoutError};

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
