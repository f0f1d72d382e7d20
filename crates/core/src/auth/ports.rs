//! Port interfaces for token lifecycle operations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use billbridge_domain::{LedgerConnection, Result, TokenExchangeResult};

/// Trait for persisting ledger connections.
///
/// Implementations encrypt token fields on write and decrypt on read;
/// [`LedgerConnection`] values crossing this boundary always hold plaintext.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Load the connection for a realm, if one exists.
    async fn get_connection(&self, realm_id: &str) -> Result<Option<LedgerConnection>>;

    /// Insert or overwrite the connection row for its realm.
    async fn upsert_connection(&self, connection: &LedgerConnection) -> Result<()>;

    /// All connected realm identifiers, oldest connection first.
    async fn list_realms(&self) -> Result<Vec<String>>;
}

/// Trait for the external authorization server.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Build the browser authorization URL for the connect flow.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the initial token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResult>;

    /// Exchange a refresh token for a rotated token pair.
    ///
    /// The server invalidates `refresh_token` as a side effect; callers must
    /// persist the returned pair before anything else can observe it.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenExchangeResult>;
}

/// Named mutual-exclusion primitive over a shared store.
///
/// Advisory locking, not consensus: `acquire` is a single non-blocking
/// attempt, entries expire after their TTL so a crashed holder cannot block
/// others forever, and `release` only removes the entry while this instance
/// still owns it. No queuing or fairness; losers implement their own wait.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock. True only if this call created the entry.
    async fn acquire(&self) -> Result<bool>;

    /// Conditionally delete the entry. True only if this instance still
    /// owned it (false when the TTL expired and someone else re-acquired).
    async fn release(&self) -> Result<bool>;

    /// Whether any owner currently holds the lock.
    async fn is_locked(&self) -> Result<bool>;
}

/// Factory for [`DistributedLock`] handles.
pub trait LockProvider: Send + Sync {
    /// Create a handle for the named lock. Each handle carries its own
    /// owner token.
    fn create_lock(&self, name: &str, ttl: Duration) -> Arc<dyn DistributedLock>;
}
