//! Main error type for the crate.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use super::{CircuitOpenError, ErrorKind, TimeoutError, classify::ErrorClassifier};

/// The primary error type for guarded calls.
///
/// `Error` is a convenient error type for operations wrapped by the
/// resilience primitives. The primitives themselves are generic over the
/// caller's error type; `Error` is what they produce when the caller has no
/// error type of its own.
///
/// ## Error Hierarchy
///
/// ```text
/// Error
/// ├── kind: ErrorKind          (category for matching)
/// ├── message: String          (human-readable description)
/// ├── retry_after: Option      (delay hint from a breaker or provider)
/// └── source: Option           (underlying cause)
/// ```
///
/// ## Example
///
/// ```rust
/// use bulwark::{Error, ErrorKind};
///
/// fn render(err: &Error) -> String {
///     match err.kind() {
///         ErrorKind::Validation => format!("Please check your input: {err}"),
///         _ => err.user_message().to_string(),
///     }
/// }
///
/// let err = Error::unavailable("payment provider returned 503");
/// assert_eq!(render(&err), "Service temporarily unavailable, please try again later.");
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    retry_after: Option<Duration>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error with the given kind and message.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bulwark::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Payment, "card declined");
    /// assert_eq!(err.kind(), ErrorKind::Payment);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self { kind, message: message.into(), retry_after: None, source: None }
    }

    /// Creates an error from a kind with a default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        let message = match kind {
            ErrorKind::Connection => "connection failed",
            ErrorKind::Timeout => "operation timed out",
            ErrorKind::RateLimited => "rate limit exceeded",
            ErrorKind::Unavailable => "service unavailable",
            ErrorKind::CircuitOpen => "Circuit breaker is OPEN",
            ErrorKind::Validation => "invalid input",
            ErrorKind::Unauthorized => "authentication failed",
            ErrorKind::Forbidden => "permission denied",
            ErrorKind::NotFound => "resource not found",
            ErrorKind::Payment => "payment failed",
            ErrorKind::Contract => "contract call failed",
            ErrorKind::Verification => "identity verification failed",
            ErrorKind::Cancelled => "operation cancelled",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Internal => "internal error",
            ErrorKind::Unknown => "unknown error",
        };
        Self::new(kind, message)
    }

    /// Creates an error whose kind is inferred from the message text using
    /// the default [`ErrorClassifier`] table.
    ///
    /// ```rust
    /// use bulwark::{Error, ErrorKind};
    ///
    /// let err = Error::classified("Network request failed: ECONNRESET");
    /// assert_eq!(err.kind(), ErrorKind::Connection);
    /// ```
    pub fn classified(message: impl Into<Cow<'static, str>>) -> Self {
        let message = message.into();
        let kind = ErrorClassifier::shared().classify(&message).kind;
        Self::new(kind, message)
    }

    /// Returns the error kind for categorization.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message without the kind prefix.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the recommended delay before trying again, if known.
    ///
    /// Populated from [`CircuitOpenError::retry_in`] or set explicitly from
    /// a provider's `Retry-After` header.
    #[inline]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Returns `true` if this error is generally safe to retry.
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }

    /// Returns text suitable for end users.
    ///
    /// Retriable kinds collapse to a "temporarily unavailable" message so
    /// exhausted retries and tripped breakers never surface raw details.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection
            | ErrorKind::Timeout
            | ErrorKind::Unavailable
            | ErrorKind::CircuitOpen => "Service temporarily unavailable, please try again later.",
            ErrorKind::RateLimited => "Too many requests, please wait a moment and try again.",
            ErrorKind::Validation => "Some of the information provided is invalid.",
            ErrorKind::Unauthorized => "Your session has expired, please sign in again.",
            ErrorKind::Forbidden => "You do not have permission to perform this action.",
            ErrorKind::NotFound => "The requested item could not be found.",
            ErrorKind::Payment => "The payment could not be processed.",
            ErrorKind::Contract => "The blockchain transaction could not be completed.",
            ErrorKind::Verification => "Identity verification could not be completed.",
            ErrorKind::Cancelled => "The operation was cancelled.",
            ErrorKind::Configuration | ErrorKind::Internal | ErrorKind::Unknown => {
                "Something went wrong, please try again later."
            },
        }
    }

    /// Sets the retry-after duration for this error.
    #[must_use]
    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Sets the source error for this error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors for common error types

    /// Creates a connection error.
    pub fn connection(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Creates a rate limited error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        let mut err = Self::from_kind(ErrorKind::RateLimited);
        err.retry_after = retry_after;
        err
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates a payment error.
    pub fn payment(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Payment, message)
    }

    /// Creates a contract error.
    pub fn contract(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Contract, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Creates a cancelled error.
    pub fn cancelled() -> Self {
        Self::from_kind(ErrorKind::Cancelled)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl From<TimeoutError> for Error {
    fn from(err: TimeoutError) -> Self {
        Error::timeout(err.message().to_owned()).with_source(err)
    }
}

impl From<CircuitOpenError> for Error {
    fn from(err: CircuitOpenError) -> Self {
        let mut out = Error::from_kind(ErrorKind::CircuitOpen);
        out.retry_after = err.retry_in();
        out.with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::configuration(format!("invalid config document: {}", err)).with_source(err)
    }
}
