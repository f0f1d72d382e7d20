//! Error taxonomy used throughout the application.
//!
//! Every failure the sync pipeline can produce is classified into one of a
//! closed set of variants. The task runner's retry policy and the status
//! detail written back onto the billing record both key off this
//! classification, so new failure modes must be mapped here rather than
//! bubbled up as strings.

use billbridge_common::error::{ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error class used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Referenced entity does not exist (404-equivalent). Not retryable.
    NotFound,
    /// Malformed input or a non-transient ledger rejection (400-equivalent).
    /// Not retryable.
    Validation,
    /// Lock unavailable, broker unreachable, rate limit, 5xx, timeout
    /// (503-equivalent). Retryable with backoff.
    Transient,
    /// Unexpected failure that fits no other class. Retried once, then
    /// treated as permanent.
    Internal,
}

/// Main error type for BillBridge.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Referenced entity (billing record, vendor, customer, department)
    /// does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input, missing required mapping, or a ledger rejection
    /// that does not match a transient signature.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Temporary infrastructure failure; safe to retry after a delay.
    #[error("transient failure: {0}")]
    Transient(String),

    /// No ledger connection row exists for the realm. The connect flow must
    /// be re-run; surfaced to callers as a validation-class failure.
    #[error("QuickBooks is not connected for realm {0}")]
    NotConnected(String),

    /// The connection row has no usable refresh token.
    #[error("no refresh token stored for realm {0}")]
    MissingRefreshToken(String),

    /// Unexpected failure that fits no other class.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Coarse class used by the retry policy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) | Self::NotConnected(_) | Self::MissingRefreshToken(_) => {
                ErrorKind::Validation
            }
            Self::Transient(_) => ErrorKind::Transient,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-equivalent status code for the status detail written back onto
    /// the billing record.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Transient => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Render the error the way it is recorded on the source record:
    /// `<status>: <message>`.
    #[must_use]
    pub fn to_record_detail(&self) -> String {
        format!("{}: {}", self.status_code(), self)
    }
}

impl ErrorClassification for SyncError {
    fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::NotFound => ErrorSeverity::Info,
            ErrorKind::Validation => ErrorSeverity::Error,
            ErrorKind::Transient => ErrorSeverity::Warning,
            ErrorKind::Internal => ErrorSeverity::Critical,
        }
    }
}

/// Result type alias for BillBridge operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    //! Unit tests for the error taxonomy.
    use super::*;

    /// Validates `SyncError::kind` behavior for the classification scenario.
    ///
    /// Assertions:
    /// - Confirms connection-state errors classify as `Validation`.
    /// - Confirms `Transient` is the only retryable kind.
    #[test]
    fn connection_errors_classify_as_validation() {
        let not_connected = SyncError::NotConnected("9130347".into());
        let missing = SyncError::MissingRefreshToken("9130347".into());

        assert_eq!(not_connected.kind(), ErrorKind::Validation);
        assert_eq!(missing.kind(), ErrorKind::Validation);
        assert!(!not_connected.is_retryable());
        assert!(SyncError::Transient("redis down".into()).is_retryable());
    }

    /// Validates `SyncError::status_code` behavior for each kind.
    ///
    /// Assertions:
    /// - Confirms 404/400/503/500 per the taxonomy.
    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(SyncError::NotFound("x".into()).status_code(), 404);
        assert_eq!(SyncError::Validation("x".into()).status_code(), 400);
        assert_eq!(SyncError::Transient("x".into()).status_code(), 503);
        assert_eq!(SyncError::Internal("x".into()).status_code(), 500);
    }

    /// Validates `SyncError::to_record_detail` formatting.
    ///
    /// Assertions:
    /// - Confirms the detail string leads with the status code.
    #[test]
    fn record_detail_leads_with_status() {
        let err = SyncError::NotFound("Vendor 'H-42' not found in QuickBooks".into());
        assert_eq!(err.to_record_detail(), "404: not found: Vendor 'H-42' not found in QuickBooks");
    }

    /// Validates `ErrorClassification::severity` mapping.
    ///
    /// Assertions:
    /// - Confirms transient failures are warnings, internal failures are
    ///   critical.
    #[test]
    fn severity_mapping() {
        assert_eq!(SyncError::Transient("x".into()).severity(), ErrorSeverity::Warning);
        assert_eq!(SyncError::Internal("x".into()).severity(), ErrorSeverity::Critical);
        assert_eq!(SyncError::NotFound("x".into()).severity(), ErrorSeverity::Info);
    }
}
