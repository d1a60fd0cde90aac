//! Circuit breaker configuration and observable breaker state.
//!
//! Circuit breakers stop calling a failing dependency for a cooldown period.
//! Unlike retry, which handles transient failures, circuit breakers protect
//! against sustained outages.
//!
//! ## States
//!
//! - **Closed**: Normal operation, calls flow through
//! - **Open**: Calls fail immediately (circuit tripped)
//! - **HalfOpen**: Trial calls test whether the dependency has recovered
//!
//! ## Example
//!
//! ```rust
//! use bulwark::CircuitBreakerConfig;
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::builder()
//!     .failure_threshold(5)                  // Open after 5 consecutive failures
//!     .successes_to_close(2)                 // Close after 2 successes in half-open
//!     .reset_timeout(Duration::from_secs(30)) // Allow a trial call after 30s
//!     .build();
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures that opens the circuit.
    #[builder(default = 5)]
    failure_threshold: u32,

    /// Time an open circuit waits before admitting a trial call.
    #[builder(default = Duration::from_secs(30))]
    reset_timeout: Duration,

    /// Consecutive half-open successes required to close the circuit.
    #[builder(default = 2)]
    successes_to_close: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CircuitBreakerConfig {
    /// Returns the failure threshold, never less than 1.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold.max(1)
    }

    /// Returns the reset timeout.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Returns the half-open success count needed to close, never less than 1.
    pub fn successes_to_close(&self) -> u32 {
        self.successes_to_close.max(1)
    }

    /// Rejects zero thresholds read from configuration files.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::configuration("circuit breaker failure_threshold must be at least 1"));
        }
        if self.successes_to_close == 0 {
            return Err(Error::configuration(
                "circuit breaker successes_to_close must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Current state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls flow through.
    Closed,
    /// Calls fail immediately (circuit tripped).
    Open,
    /// Trial calls are admitted to test recovery.
    HalfOpen,
}

impl CircuitState {
    /// Returns `true` if the circuit is closed (normal operation).
    pub fn is_closed(&self) -> bool {
        matches!(self, CircuitState::Closed)
    }

    /// Returns `true` if the circuit is open (blocking calls).
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitState::Open)
    }

    /// Returns `true` if the circuit is half-open (testing recovery).
    pub fn is_half_open(&self) -> bool {
        matches!(self, CircuitState::HalfOpen)
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time circuit breaker statistics.
///
/// Serializable so it can be served straight from a health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitStats {
    /// Name of the guarded dependency.
    pub name: String,
    /// Current state of the circuit.
    pub state: CircuitState,
    /// Consecutive failures counted in the closed state.
    pub failure_count: u32,
    /// Consecutive successes counted in the half-open state.
    pub half_open_successes: u32,
    /// Calls that reached the operation.
    pub total_calls: u64,
    /// Calls whose operation failed.
    pub failed_calls: u64,
    /// Calls rejected without invoking the operation.
    pub rejected_calls: u64,
    /// Wall-clock time of the most recent recorded failure.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Wall-clock time the circuit last opened.
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Wall-clock time the circuit last closed after having been open.
    pub last_closed_at: Option<DateTime<Utc>>,
}

impl CircuitStats {
    /// Creates empty stats in the closed state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            half_open_successes: 0,
            total_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
            last_failure_at: None,
            last_opened_at: None,
            last_closed_at: None,
        }
    }

    /// Returns the lifetime failure rate of admitted calls.
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failed_calls as f64 / self.total_calls as f64
        }
    }
}

/// Events emitted by the circuit breaker on state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitEvent {
    /// Circuit transitioned to open state.
    Opened {
        /// Consecutive failures that triggered the open.
        failure_count: u32,
        /// Description of the last error.
        last_error: String,
    },
    /// Circuit transitioned to half-open state.
    HalfOpened,
    /// Circuit transitioned to closed state.
    Closed {
        /// Half-open successes that triggered the close; 0 for a manual reset.
        success_count: u32,
    },
}

impl CircuitEvent {
    /// Returns the state the circuit is in after this event.
    pub fn state(&self) -> CircuitState {
        match self {
            CircuitEvent::Opened { .. } => CircuitState::Open,
            CircuitEvent::HalfOpened => CircuitState::HalfOpen,
            CircuitEvent::Closed { .. } => CircuitState::Closed,
        }
    }
}

impl std::fmt::Display for CircuitEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitEvent::Opened { failure_count, last_error } => {
                write!(f, "circuit opened after {} failures: {}", failure_count, last_error)
            },
            CircuitEvent::HalfOpened => write!(f, "circuit half-opened (testing recovery)"),
            CircuitEvent::Closed { success_count } => {
                write!(f, "circuit closed after {} successes", success_count)
            },
        }
    }
}
