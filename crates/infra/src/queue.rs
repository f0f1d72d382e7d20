//! Durable job queue on the shared key-value store.
//!
//! Two structures per queue: a ready list consumed with `RPOP`, and a
//! delayed sorted set scored by the epoch-second due time. `dequeue`
//! promotes due members onto the ready list first; promotion uses `ZREM` as
//! the claim, so two workers promoting concurrently cannot duplicate a job.
//! Jobs are JSON-encoded [`SyncJob`] values.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use billbridge_core::jobs::JobQueue;
use billbridge_domain::{Result, SyncError, SyncJob};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::errors::InfraError;

const READY_KEY: &str = "billbridge:jobs:ready";
const DELAYED_KEY: &str = "billbridge:jobs:delayed";

/// Redis-backed implementation of the [`JobQueue`] port.
pub struct RedisJobQueue {
    conn: ConnectionManager,
    ready_key: String,
    delayed_key: String,
}

impl RedisJobQueue {
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, ready_key: READY_KEY.to_string(), delayed_key: DELAYED_KEY.to_string() }
    }

    /// Use distinct keys, for tests sharing one Redis.
    #[must_use]
    pub fn with_key_prefix(conn: ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            ready_key: format!("{prefix}:ready"),
            delayed_key: format!("{prefix}:delayed"),
        }
    }

    /// Move every due member of the delayed set onto the ready list.
    async fn promote_due_jobs(&self, conn: &mut ConnectionManager) -> Result<()> {
        let now = epoch_seconds();
        let due: Vec<String> = conn
            .zrangebyscore(&self.delayed_key, 0, now as isize)
            .await
            .map_err(InfraError::from)?;

        for payload in due {
            // ZREM returns 1 for exactly one worker; that worker owns the
            // promotion.
            let claimed: i64 = conn
                .zrem(&self.delayed_key, &payload)
                .await
                .map_err(InfraError::from)?;
            if claimed > 0 {
                let _: () = conn.lpush(&self.ready_key, &payload).await.map_err(InfraError::from)?;
                debug!("promoted delayed job to ready list");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &SyncJob) -> Result<()> {
        let payload = encode(job)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.ready_key, payload).await.map_err(InfraError::from)?;
        debug!(record_id = %job.record_id, attempt = job.attempt, "job enqueued");
        Ok(())
    }

    async fn enqueue_delayed(&self, job: &SyncJob, delay: Duration) -> Result<()> {
        let payload = encode(job)?;
        let due_at = epoch_seconds() + delay.as_secs();
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(&self.delayed_key, payload, due_at)
            .await
            .map_err(InfraError::from)?;
        debug!(
            record_id = %job.record_id,
            attempt = job.attempt,
            delay_secs = delay.as_secs(),
            "job enqueued with delay"
        );
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<SyncJob>> {
        let mut conn = self.conn.clone();
        self.promote_due_jobs(&mut conn).await?;

        let payload: Option<String> =
            conn.rpop(&self.ready_key, None).await.map_err(InfraError::from)?;

        match payload {
            Some(payload) => match serde_json::from_str::<SyncJob>(&payload) {
                Ok(job) => Ok(Some(job)),
                Err(err) => {
                    // A malformed payload would wedge the queue if re-queued;
                    // drop it and surface the next job instead.
                    warn!(error = %err, "dropping malformed job payload");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}

fn encode(job: &SyncJob) -> Result<String> {
    serde_json::to_string(job)
        .map_err(|err| SyncError::Internal(format!("failed to encode job: {err}")))
}

fn epoch_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
