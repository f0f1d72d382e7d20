//! OAuth token lifecycle management.

pub mod manager;
pub mod ports;

pub use manager::CredentialManager;
pub use ports::{AuthorizationClient, ConnectionStore, DistributedLock, LockProvider};
