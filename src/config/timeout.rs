//! Timeout configuration.

use std::{borrow::Cow, time::Duration};

use crate::error::TimeoutError;

/// A deadline plus the message reported when it is exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Time allowed for the operation to settle.
    pub duration: Duration,
    /// Message for the resulting [`TimeoutError`]; a default is used if unset.
    pub message: Option<Cow<'static, str>>,
}

impl TimeoutConfig {
    /// Creates a timeout with the default message.
    pub fn new(duration: Duration) -> Self {
        Self { duration, message: None }
    }

    /// Sets the timeout message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Builds the error reported when this deadline wins the race.
    pub fn error(&self) -> TimeoutError {
        match &self.message {
            Some(message) => TimeoutError::with_message(self.duration, message.clone()),
            None => TimeoutError::new(self.duration),
        }
    }
}

impl From<Duration> for TimeoutConfig {
    fn from(duration: Duration) -> Self {
        Self::new(duration)
    }
}
