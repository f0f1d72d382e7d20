//! Bounded retry policy keyed on the error taxonomy.
//!
//! State machine per job: `queued → running → {succeeded | failed-permanent
//! | failed-retrying}`, where `failed-retrying` re-enters `queued` after the
//! delay until the attempt cap turns it into `failed-permanent`.

use std::time::Duration;

use billbridge_domain::{ErrorKind, Result, WorkerConfig};

/// Outcome of applying the retry policy to one finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobVerdict {
    /// Terminal success.
    Succeeded,
    /// Re-enqueue after the delay.
    Retry { delay: Duration },
    /// Terminal failure; the record's status detail is the user-visible
    /// outcome.
    FailedPermanent,
}

/// Pure decision table from (error kind, attempt) to a verdict.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    /// Build the policy from worker configuration.
    #[must_use]
    pub fn new(worker: &WorkerConfig) -> Self {
        Self {
            max_attempts: worker.max_attempts.max(1),
            retry_delay: Duration::from_secs(worker.retry_delay_seconds),
        }
    }

    /// Decide what happens after the given 1-based attempt finished with
    /// `outcome`.
    ///
    /// - `Validation` and `NotFound` represent invalid input state; retrying
    ///   cannot help, so they are permanent immediately.
    /// - `Transient` retries with the fixed delay up to the attempt cap.
    /// - `Internal` (unclassified) is granted a single retry, then promoted
    ///   to permanent.
    #[must_use]
    pub fn decide(&self, outcome: &Result<()>, attempt: u32) -> JobVerdict {
        let err = match outcome {
            Ok(()) => return JobVerdict::Succeeded,
            Err(err) => err,
        };

        match err.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => JobVerdict::FailedPermanent,
            ErrorKind::Transient => {
                if attempt < self.max_attempts {
                    JobVerdict::Retry { delay: self.retry_delay }
                } else {
                    JobVerdict::FailedPermanent
                }
            }
            ErrorKind::Internal => {
                if attempt < 2 {
                    JobVerdict::Retry { delay: self.retry_delay }
                } else {
                    JobVerdict::FailedPermanent
                }
            }
        }
    }

    /// Re-enqueue delay for transient failures.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Attempt cap, first execution included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
