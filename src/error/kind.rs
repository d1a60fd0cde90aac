//! Error kind enumeration for categorizing failures of guarded calls.

use serde::{Deserialize, Serialize};

/// Categorization of errors seen by the resilience primitives.
///
/// This enum provides a stable interface for matching on error types and is
/// the "category tag" that retry matchers can select on.
///
/// ## Retriable vs Non-Retriable
///
/// | ErrorKind       | Retriable | Action                          |
/// |-----------------|-----------|---------------------------------|
/// | `Connection`    | Yes       | Retry with backoff              |
/// | `Timeout`       | Yes       | Retry with backoff              |
/// | `RateLimited`   | Yes       | Retry with backoff              |
/// | `Unavailable`   | Yes       | Retry with backoff              |
/// | `CircuitOpen`   | Yes       | Wait for the reset timeout      |
/// | `Validation`    | No        | Fix input                       |
/// | `Unauthorized`  | No        | Fix credentials                 |
/// | `Forbidden`     | No        | Fix permissions                 |
/// | `NotFound`      | No        | Resource doesn't exist          |
/// | `Payment`       | No        | Surface to the user             |
/// | `Contract`      | No        | Inspect the revert reason       |
/// | `Verification`  | No        | Restart identity verification   |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network-level failure (DNS, refused connection, reset, offline).
    ///
    /// **Retriable.**
    #[error("connection error")]
    Connection,

    /// The operation exceeded its allotted duration.
    ///
    /// HTTP: 504 Gateway Timeout or client-side timeout
    ///
    /// **Retriable.**
    #[error("timeout")]
    Timeout,

    /// The dependency throttled the caller.
    ///
    /// HTTP: 429 Too Many Requests
    ///
    /// **Retriable.**
    #[error("rate limited")]
    RateLimited,

    /// The dependency is temporarily unavailable.
    ///
    /// HTTP: 502/503
    ///
    /// **Retriable.**
    #[error("service unavailable")]
    Unavailable,

    /// A circuit breaker rejected the call without invoking the dependency.
    ///
    /// **Retriable** after the breaker's reset timeout.
    #[error("circuit breaker open")]
    CircuitOpen,

    /// The request was rejected as malformed or semantically invalid.
    ///
    /// HTTP: 400 Bad Request, 422 Unprocessable Entity
    #[error("validation error")]
    Validation,

    /// Missing, invalid or expired credentials.
    ///
    /// HTTP: 401 Unauthorized
    #[error("unauthorized")]
    Unauthorized,

    /// Valid credentials without the required permission.
    ///
    /// HTTP: 403 Forbidden
    #[error("forbidden")]
    Forbidden,

    /// The requested resource does not exist.
    ///
    /// HTTP: 404 Not Found
    #[error("not found")]
    NotFound,

    /// The payment provider declined or failed the charge.
    ///
    /// HTTP: 402 Payment Required
    #[error("payment error")]
    Payment,

    /// A blockchain contract call reverted or could not be submitted.
    #[error("contract error")]
    Contract,

    /// Identity verification (KYC/AML) failed or was rejected.
    #[error("verification error")]
    Verification,

    /// The operation was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// Invalid configuration (zero attempts, malformed config document).
    #[error("configuration error")]
    Configuration,

    /// Unexpected failure inside the dependency.
    ///
    /// HTTP: 500 Internal Server Error
    #[error("internal error")]
    Internal,

    /// Anything that could not be categorized.
    #[error("unknown error")]
    Unknown,
}

impl ErrorKind {
    /// Returns `true` if this error kind is generally safe to retry.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bulwark::ErrorKind;
    ///
    /// assert!(ErrorKind::Timeout.is_retriable());
    /// assert!(!ErrorKind::Validation.is_retriable());
    /// ```
    #[inline]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Connection
                | ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::Unavailable
                | ErrorKind::CircuitOpen
        )
    }

    /// Returns the snake_case tag used in configuration files and logs.
    pub fn as_tag(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Payment => "payment",
            ErrorKind::Contract => "contract",
            ErrorKind::Verification => "verification",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
        }
    }
}
