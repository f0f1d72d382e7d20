//! Distributed lock over the shared key-value store.
//!
//! Advisory named locking used to serialize token refreshes across worker
//! processes. `acquire` is a single `SET NX EX` attempt carrying a unique
//! owner token; `release` is a compare-and-delete that only removes the
//! entry while this instance still owns it, so a holder that outlived its
//! TTL cannot release a lock someone else has since taken. Crash recovery
//! comes from the TTL alone; there is no fairness and no queueing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use billbridge_core::auth::{DistributedLock, LockProvider};
use billbridge_domain::Result;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::debug;
use uuid::Uuid;

use crate::errors::InfraError;

/// Compare-and-delete: remove the key only while we still own it.
const RELEASE_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end";

/// Redis-backed implementation of the [`DistributedLock`] port.
pub struct RedisLock {
    conn: ConnectionManager,
    lock_key: String,
    ttl: Duration,
    owner: Uuid,
}

impl RedisLock {
    /// Create a handle for the named lock with a fresh owner token.
    #[must_use]
    pub fn new(conn: ConnectionManager, lock_key: impl Into<String>, ttl: Duration) -> Self {
        Self { conn, lock_key: lock_key.into(), ttl, owner: Uuid::new_v4() }
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&self.lock_key)
            .arg(self.owner.to_string())
            .arg("NX")
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(InfraError::from)?;

        let newly_created = acquired.is_some();
        debug!(lock_key = %self.lock_key, acquired = newly_created, "lock acquire attempt");
        Ok(newly_created)
    }

    async fn release(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(&self.lock_key)
            .arg(self.owner.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(InfraError::from)?;

        debug!(lock_key = %self.lock_key, released = deleted > 0, "lock release attempt");
        Ok(deleted > 0)
    }

    async fn is_locked(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(&self.lock_key)
            .query_async(&mut conn)
            .await
            .map_err(InfraError::from)?;
        Ok(exists)
    }
}

/// Factory handing out [`RedisLock`] handles over a shared connection.
pub struct RedisLockProvider {
    conn: ConnectionManager,
}

impl RedisLockProvider {
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl LockProvider for RedisLockProvider {
    fn create_lock(&self, name: &str, ttl: Duration) -> Arc<dyn DistributedLock> {
        Arc::new(RedisLock::new(self.conn.clone(), name, ttl))
    }
}
