//! Port interface for the durable work queue.

use std::time::Duration;

use async_trait::async_trait;
use billbridge_domain::{Result, SyncJob};

/// Trait for the durable work queue backing the task runner.
///
/// Implementations are broker-backed and shared by every worker process; a
/// job is consumed by exactly one worker per attempt. Broker connectivity
/// failures surface as `Transient` errors.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job for immediate execution.
    async fn enqueue(&self, job: &SyncJob) -> Result<()>;

    /// Enqueue a job to become ready after the given delay.
    async fn enqueue_delayed(&self, job: &SyncJob, delay: Duration) -> Result<()>;

    /// Pop the next ready job, promoting any due delayed jobs first.
    /// Returns `None` when the queue is idle.
    async fn dequeue(&self) -> Result<Option<SyncJob>>;
}
