//! Queue job types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of work on the sync queue: process a single billing record.
///
/// Serialized as JSON onto the broker; consumed exactly once per attempt and
/// re-enqueued by the retry policy with `attempt` incremented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: Uuid,
    pub record_id: String,
    /// Optional realm override; when absent the sync engine picks the
    /// sole or first stored connection.
    pub realm_id: Option<String>,
    /// 1-based attempt counter.
    pub attempt: u32,
}

impl SyncJob {
    /// Create a first-attempt job for a billing record.
    #[must_use]
    pub fn new(record_id: impl Into<String>) -> Self {
        Self { job_id: Uuid::new_v4(), record_id: record_id.into(), realm_id: None, attempt: 1 }
    }

    /// Pin the job to a specific realm.
    #[must_use]
    pub fn with_realm(mut self, realm_id: impl Into<String>) -> Self {
        self.realm_id = Some(realm_id.into());
        self
    }

    /// The same work item, one attempt later.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self { attempt: self.attempt + 1, ..self.clone() }
    }
}
