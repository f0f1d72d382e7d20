//! Conversions from external infrastructure errors into the domain taxonomy.
//!
//! Adapters never hand raw driver errors upward: everything is mapped here
//! so retryability is decided in one place. Connectivity-shaped failures
//! (busy database, unreachable broker, transport errors) become `Transient`;
//! everything that looks like a bug or corrupted state becomes `Internal`.

use billbridge_common::crypto::CryptoError;
use billbridge_domain::SyncError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SyncError);

impl From<InfraError> for SyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<rusqlite::Error> for InfraError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let mapped = match err {
            RE::SqliteFailure(code, maybe_message) => match code.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    SyncError::Transient("connection database is busy".into())
                }
                _ => SyncError::Internal(format!(
                    "sqlite failure {:?} (code {}): {}",
                    code.code,
                    code.extended_code,
                    maybe_message.unwrap_or_default()
                )),
            },
            RE::QueryReturnedNoRows => SyncError::NotFound("no rows returned by query".into()),
            other => SyncError::Internal(format!("sqlite error: {other}")),
        };
        Self(mapped)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(err: r2d2::Error) -> Self {
        Self(SyncError::Transient(format!("connection pool unavailable: {err}")))
    }
}

impl From<redis::RedisError> for InfraError {
    fn from(err: redis::RedisError) -> Self {
        // The broker being down is the canonical transient failure: the
        // webhook answers 503 and the worker backs off.
        Self(SyncError::Transient(format!("key-value store unavailable: {err}")))
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(err: reqwest::Error) -> Self {
        let mapped = if err.is_timeout() || err.is_connect() || err.is_request() {
            SyncError::Transient(format!("http transport failure: {err}"))
        } else {
            SyncError::Internal(format!("http client error: {err}"))
        };
        Self(mapped)
    }
}

impl From<CryptoError> for InfraError {
    fn from(err: CryptoError) -> Self {
        // A token that no longer decrypts means the key changed or the row
        // was corrupted; retrying cannot help and an operator must look.
        Self(SyncError::Internal(format!("token cipher failure: {err}")))
    }
}

impl From<tokio::task::JoinError> for InfraError {
    fn from(err: tokio::task::JoinError) -> Self {
        let mapped = if err.is_cancelled() {
            SyncError::Transient("blocking task cancelled".into())
        } else {
            SyncError::Internal(format!("blocking task failed: {err}"))
        };
        Self(mapped)
    }
}
