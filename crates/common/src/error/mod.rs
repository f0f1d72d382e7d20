//! Error classification infrastructure.
//!
//! Every error type in the system implements [`ErrorClassification`] so that
//! retry policies and logging can treat errors uniformly without matching on
//! concrete enums:
//!
//! - **`is_retryable()`**: can the failed operation be retried?
//! - **`severity()`**: how serious is this error? (Info/Warning/Error/Critical)
//! - **`is_critical()`**: does this require immediate attention?
//! - **`retry_after()`**: suggested retry delay, if the error carries one
//!
//! The trait lives here rather than next to the domain error enum so that
//! infrastructure error types can implement it without depending on the
//! domain crate.

use std::fmt;
use std::time::Duration;

/// Unified severity level for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, expected conditions (missing resource, empty result)
    Info,
    /// Degraded but operational (rate limiting, lock contention)
    Warning,
    /// Failure requiring attention (network errors, invalid input)
    Error,
    /// System integrity at risk (data corruption, encryption failures)
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Whether the failed operation can meaningfully be retried.
    fn is_retryable(&self) -> bool;

    /// Severity for monitoring and alerting.
    fn severity(&self) -> ErrorSeverity;

    /// Whether the error requires immediate attention.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Suggested delay before retrying, when the error carries one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
