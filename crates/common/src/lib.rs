//! # BillBridge Common
//!
//! Foundation utilities shared across the workspace:
//! - Error classification (`error`): retryability and severity contracts
//!   implemented by every error type in the system
//! - Token cryptography (`crypto`): AES-256-GCM cipher used to keep OAuth
//!   tokens encrypted at rest
//!
//! ## Architecture
//! - No dependencies on other BillBridge crates
//! - No I/O; everything here is pure and synchronous

pub mod crypto;
pub mod error;

pub use crypto::{CryptoError, TokenCipher};
pub use error::{ErrorClassification, ErrorSeverity};
