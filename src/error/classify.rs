//! Message-based error categorization.
//!
//! Providers and SDKs in the surrounding application mostly fail with bare
//! strings ("Network request failed", "Your card was declined", "execution
//! reverted: nonce too low"). [`ErrorClassifier`] turns such text into an
//! [`ErrorKind`] and a [`Severity`] using an explicit rule table, so the
//! mapping can be inspected, extended and tested as data.
//!
//! [`Classify`] is the seam the retrier uses to ask an error for its
//! category tag.

use std::{borrow::Cow, fmt, sync::LazyLock};

use serde::{Deserialize, Serialize};

use super::{CircuitOpenError, Error, ErrorKind, TimeoutError};

/// How urgently a failure should be looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected, user-correctable failures.
    Low,
    /// Transient infrastructure failures.
    Medium,
    /// Failures that block a business flow (payments, contracts).
    High,
    /// Failures that need immediate attention.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One row of the classification table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pattern: Cow<'static, str>,
    kind: ErrorKind,
    severity: Severity,
}

impl ClassificationRule {
    /// Creates a rule. The pattern is matched case-insensitively.
    pub fn new(pattern: impl Into<Cow<'static, str>>, kind: ErrorKind, severity: Severity) -> Self {
        let pattern = match pattern.into() {
            Cow::Borrowed(p) if p.chars().all(|c| !c.is_uppercase()) => Cow::Borrowed(p),
            p => Cow::Owned(p.to_lowercase()),
        };
        Self { pattern, kind, severity }
    }

    /// Returns the lowercase pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the kind assigned on match.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the severity assigned on match.
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Result of classifying a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Assigned category.
    pub kind: ErrorKind,
    /// Assigned severity.
    pub severity: Severity,
    /// The pattern that matched, `None` when the fallback was used.
    pub matched: Option<String>,
}

/// Ordered table of substring rules. The first matching rule wins.
///
/// ## Example
///
/// ```rust
/// use bulwark::{ErrorClassifier, ErrorKind, Severity};
///
/// let classifier = ErrorClassifier::default()
///     .with_rule("sanctions list", ErrorKind::Verification, Severity::Critical);
///
/// let c = classifier.classify("Applicant matched SANCTIONS LIST entry");
/// assert_eq!(c.kind, ErrorKind::Verification);
/// assert_eq!(c.severity, Severity::Critical);
/// ```
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
    fallback_kind: ErrorKind,
    fallback_severity: Severity,
}

static SHARED: LazyLock<ErrorClassifier> = LazyLock::new(ErrorClassifier::default);

const DEFAULT_RULES: &[(&str, ErrorKind, Severity)] = &[
    ("circuit breaker", ErrorKind::CircuitOpen, Severity::High),
    ("timeout", ErrorKind::Timeout, Severity::Medium),
    ("timed out", ErrorKind::Timeout, Severity::Medium),
    ("rate limit", ErrorKind::RateLimited, Severity::Medium),
    ("too many requests", ErrorKind::RateLimited, Severity::Medium),
    ("network", ErrorKind::Connection, Severity::Medium),
    ("fetch failed", ErrorKind::Connection, Severity::Medium),
    ("econnrefused", ErrorKind::Connection, Severity::Medium),
    ("econnreset", ErrorKind::Connection, Severity::Medium),
    ("connection", ErrorKind::Connection, Severity::Medium),
    ("offline", ErrorKind::Connection, Severity::Medium),
    ("service unavailable", ErrorKind::Unavailable, Severity::High),
    ("bad gateway", ErrorKind::Unavailable, Severity::High),
    ("unauthorized", ErrorKind::Unauthorized, Severity::High),
    ("jwt", ErrorKind::Unauthorized, Severity::High),
    ("not authenticated", ErrorKind::Unauthorized, Severity::High),
    ("forbidden", ErrorKind::Forbidden, Severity::High),
    ("permission denied", ErrorKind::Forbidden, Severity::High),
    ("insufficient funds", ErrorKind::Payment, Severity::High),
    ("card", ErrorKind::Payment, Severity::High),
    ("payment", ErrorKind::Payment, Severity::High),
    ("declined", ErrorKind::Payment, Severity::High),
    ("execution reverted", ErrorKind::Contract, Severity::High),
    ("revert", ErrorKind::Contract, Severity::High),
    ("nonce", ErrorKind::Contract, Severity::High),
    ("gas", ErrorKind::Contract, Severity::High),
    ("user rejected", ErrorKind::Contract, Severity::Low),
    ("kyc", ErrorKind::Verification, Severity::Medium),
    ("verification", ErrorKind::Verification, Severity::Medium),
    ("not found", ErrorKind::NotFound, Severity::Low),
    ("validation", ErrorKind::Validation, Severity::Low),
    ("invalid", ErrorKind::Validation, Severity::Low),
    ("required", ErrorKind::Validation, Severity::Low),
    ("cancel", ErrorKind::Cancelled, Severity::Low),
    ("aborted", ErrorKind::Cancelled, Severity::Low),
];

impl Default for ErrorClassifier {
    /// The built-in table for network, payment, contract and KYC failures.
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(pattern, kind, severity)| ClassificationRule::new(*pattern, *kind, *severity))
            .collect();
        Self { rules, fallback_kind: ErrorKind::Unknown, fallback_severity: Severity::Medium }
    }
}

impl ErrorClassifier {
    /// Creates a classifier with no rules; everything maps to the fallback.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            fallback_kind: ErrorKind::Unknown,
            fallback_severity: Severity::Medium,
        }
    }

    /// Returns the process-wide default classifier.
    pub fn shared() -> &'static ErrorClassifier {
        &SHARED
    }

    /// Appends a rule. Rules are tried in insertion order.
    #[must_use]
    pub fn with_rule(
        mut self,
        pattern: impl Into<Cow<'static, str>>,
        kind: ErrorKind,
        severity: Severity,
    ) -> Self {
        self.rules.push(ClassificationRule::new(pattern, kind, severity));
        self
    }

    /// Inserts a rule ahead of all existing rules.
    #[must_use]
    pub fn with_priority_rule(
        mut self,
        pattern: impl Into<Cow<'static, str>>,
        kind: ErrorKind,
        severity: Severity,
    ) -> Self {
        self.rules.insert(0, ClassificationRule::new(pattern, kind, severity));
        self
    }

    /// Sets the result used when no rule matches.
    #[must_use]
    pub fn with_fallback(mut self, kind: ErrorKind, severity: Severity) -> Self {
        self.fallback_kind = kind;
        self.fallback_severity = severity;
        self
    }

    /// Returns the rule table.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classifies a message. Pure; never fails.
    pub fn classify(&self, message: &str) -> Classification {
        let haystack = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| haystack.contains(rule.pattern()))
            .map(|rule| Classification {
                kind: rule.kind,
                severity: rule.severity,
                matched: Some(rule.pattern().to_owned()),
            })
            .unwrap_or(Classification {
                kind: self.fallback_kind,
                severity: self.fallback_severity,
                matched: None,
            })
    }
}

/// An error that the retrier can match against.
///
/// Matching always looks at the `Display` text; `kind()` additionally exposes
/// an explicit category tag when the error has one. Implement it for your own
/// error type with an empty `impl` block if it carries no category.
///
/// Plain strings carry no tag. Run them through [`Error::classified`] to get
/// one inferred from the message.
///
/// ```rust
/// use bulwark::{Classify, ErrorKind};
///
/// #[derive(Debug)]
/// enum GatewayError {
///     Declined,
///     TooManyRequests,
/// }
///
/// impl std::fmt::Display for GatewayError {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         match self {
///             GatewayError::Declined => write!(f, "card declined"),
///             GatewayError::TooManyRequests => write!(f, "slow down"),
///         }
///     }
/// }
///
/// impl Classify for GatewayError {
///     fn kind(&self) -> Option<ErrorKind> {
///         match self {
///             GatewayError::Declined => Some(ErrorKind::Payment),
///             GatewayError::TooManyRequests => Some(ErrorKind::RateLimited),
///         }
///     }
/// }
///
/// assert_eq!(GatewayError::TooManyRequests.kind(), Some(ErrorKind::RateLimited));
/// ```
pub trait Classify: fmt::Display {
    /// Returns the category tag for this error, if it has one.
    fn kind(&self) -> Option<ErrorKind> {
        None
    }
}

impl Classify for Error {
    fn kind(&self) -> Option<ErrorKind> {
        Some(Error::kind(self))
    }
}

impl Classify for TimeoutError {
    fn kind(&self) -> Option<ErrorKind> {
        Some(ErrorKind::Timeout)
    }
}

impl Classify for CircuitOpenError {
    fn kind(&self) -> Option<ErrorKind> {
        Some(ErrorKind::CircuitOpen)
    }
}

impl Classify for String {}

impl Classify for &str {}

impl Classify for Box<dyn std::error::Error + Send + Sync> {
    fn kind(&self) -> Option<ErrorKind> {
        if let Some(err) = self.downcast_ref::<Error>() {
            return Some(err.kind());
        }
        if self.is::<TimeoutError>() {
            return Some(ErrorKind::Timeout);
        }
        if self.is::<CircuitOpenError>() {
            return Some(ErrorKind::CircuitOpen);
        }
        None
    }
}

impl<T: Classify + ?Sized> Classify for std::sync::Arc<T> {
    fn kind(&self) -> Option<ErrorKind> {
        (**self).kind()
    }
}
