//! Errors raised by the primitives themselves rather than by the guarded call.

use std::{borrow::Cow, time::Duration};

/// The guarded operation did not settle within its deadline.
///
/// Produced by [`with_timeout`](crate::with_timeout) and converted into the
/// caller's error type through `From<TimeoutError>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TimeoutError {
    message: Cow<'static, str>,
    duration: Duration,
}

impl TimeoutError {
    /// Creates a timeout error with the default message.
    pub fn new(duration: Duration) -> Self {
        Self { message: Cow::Owned(format!("operation timed out after {duration:?}")), duration }
    }

    /// Creates a timeout error with a caller-supplied message.
    pub fn with_message(duration: Duration, message: impl Into<Cow<'static, str>>) -> Self {
        Self { message: message.into(), duration }
    }

    /// Returns the message carried by this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the deadline that was exceeded.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// A circuit breaker short-circuited the call.
///
/// The guarded operation was not invoked. `retry_in` is the remaining time
/// until the breaker admits a trial call, when known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Circuit breaker is OPEN")]
pub struct CircuitOpenError {
    breaker: String,
    retry_in: Option<Duration>,
}

impl CircuitOpenError {
    /// Creates an error for the named breaker.
    pub fn new(breaker: impl Into<String>, retry_in: Option<Duration>) -> Self {
        Self { breaker: breaker.into(), retry_in }
    }

    /// Returns the name of the breaker that rejected the call.
    pub fn breaker(&self) -> &str {
        &self.breaker
    }

    /// Returns the time left before the breaker allows a trial call.
    pub fn retry_in(&self) -> Option<Duration> {
        self.retry_in
    }
}
