//! Queue worker loop.
//!
//! Each execution slot runs this loop: pop a job, run the sync engine once,
//! apply the retry policy, re-enqueue or drop. Jobs are independent; one
//! job's failure never affects concurrently running jobs for other records.

use std::sync::Arc;
use std::time::Duration;

use billbridge_domain::SyncJob;
use tracing::{error, info, warn};

use super::policy::{JobVerdict, RetryPolicy};
use super::ports::JobQueue;
use crate::sync::BillSyncService;

const IDLE_SLEEP: Duration = Duration::from_secs(1);

/// Executes sync jobs from the durable queue.
pub struct JobRunner {
    queue: Arc<dyn JobQueue>,
    engine: Arc<BillSyncService>,
    policy: RetryPolicy,
}

impl JobRunner {
    /// Create a runner wired to the queue and engine.
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>, engine: Arc<BillSyncService>, policy: RetryPolicy) -> Self {
        Self { queue, engine, policy }
    }

    /// Run until the future is dropped (binaries select against a shutdown
    /// signal). Queue errors are logged and backed off, never fatal.
    pub async fn run(&self) {
        loop {
            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    self.process_job(&job).await;
                }
                Ok(None) => tokio::time::sleep(IDLE_SLEEP).await,
                Err(err) => {
                    warn!(error = %err, "queue dequeue failed, backing off");
                    tokio::time::sleep(IDLE_SLEEP).await;
                }
            }
        }
    }

    /// Execute one attempt and apply the retry policy.
    ///
    /// Returns the verdict so callers (and tests) can observe the state
    /// transition.
    pub async fn process_job(&self, job: &SyncJob) -> JobVerdict {
        info!(
            record_id = %job.record_id,
            job_id = %job.job_id,
            attempt = job.attempt,
            "job running"
        );

        let outcome = self.engine.sync(&job.record_id, job.realm_id.as_deref()).await;
        let verdict = self.policy.decide(&outcome, job.attempt);

        match verdict {
            JobVerdict::Succeeded => {
                info!(record_id = %job.record_id, job_id = %job.job_id, "job succeeded");
            }
            JobVerdict::Retry { delay } => {
                let failure = outcome.err().map(|e| e.to_string()).unwrap_or_default();
                warn!(
                    record_id = %job.record_id,
                    job_id = %job.job_id,
                    attempt = job.attempt,
                    delay_secs = delay.as_secs(),
                    error = %failure,
                    "job failed, re-enqueueing"
                );
                if let Err(enqueue_err) =
                    self.queue.enqueue_delayed(&job.next_attempt(), delay).await
                {
                    // The record keeps its issue detail; an operator can
                    // re-trigger the webhook once the broker is back.
                    error!(
                        record_id = %job.record_id,
                        job_id = %job.job_id,
                        error = %enqueue_err,
                        "failed to re-enqueue job, retry dropped"
                    );
                }
            }
            JobVerdict::FailedPermanent => {
                let failure = outcome.err().map(|e| e.to_string()).unwrap_or_default();
                error!(
                    record_id = %job.record_id,
                    job_id = %job.job_id,
                    attempt = job.attempt,
                    error = %failure,
                    "job failed permanently"
                );
            }
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the worker loop against an in-memory queue.
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use billbridge_domain::{
        AccessCredential, BillStatus, BillingRecord, Environment, LedgerConnection, Result,
        SyncError, TokenExchangeResult, WorkerConfig,
    };
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::auth::{
        AuthorizationClient, ConnectionStore, CredentialManager, DistributedLock, LockProvider,
    };
    use crate::sync::ports::{
        AccountRef, BillRef, CustomerRef, DepartmentRef, LedgerApi, LedgerBill, RecordStore,
        VendorRef,
    };

    struct MemoryQueue {
        ready: Mutex<Vec<SyncJob>>,
        delayed: Mutex<Vec<(SyncJob, Duration)>>,
    }

    impl MemoryQueue {
        fn new() -> Self {
            Self { ready: Mutex::new(Vec::new()), delayed: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl JobQueue for MemoryQueue {
        async fn enqueue(&self, job: &SyncJob) -> Result<()> {
            self.ready.lock().unwrap().push(job.clone());
            Ok(())
        }

        async fn enqueue_delayed(&self, job: &SyncJob, delay: Duration) -> Result<()> {
            self.delayed.lock().unwrap().push((job.clone(), delay));
            Ok(())
        }

        async fn dequeue(&self) -> Result<Option<SyncJob>> {
            Ok(self.ready.lock().unwrap().pop())
        }
    }

    struct StubRecordStore {
        record: BillingRecord,
    }

    #[async_trait]
    impl RecordStore for StubRecordStore {
        async fn fetch_billing_record(&self, record_id: &str) -> Result<BillingRecord> {
            if record_id == self.record.id {
                Ok(self.record.clone())
            } else {
                Err(SyncError::NotFound(format!("Bill with id {record_id} not found")))
            }
        }

        async fn save_status(
            &self,
            _record_id: &str,
            _status: BillStatus,
            _detail: &str,
        ) -> Result<()> {
            Ok(())
        }
    }

    /// Ledger whose `create_bill` fails transiently a configurable number
    /// of times before succeeding.
    struct FlakyLedger {
        failures_before_success: usize,
        create_calls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerApi for FlakyLedger {
        async fn find_vendor(
            &self,
            _c: &AccessCredential,
            _n: &str,
        ) -> Result<Option<VendorRef>> {
            Ok(Some(VendorRef { id: "V1".into(), display_name: "Hauler".into() }))
        }

        async fn find_customer_by_display_name(
            &self,
            _c: &AccessCredential,
            _f: &str,
        ) -> Result<Option<CustomerRef>> {
            Ok(Some(CustomerRef { id: "C1".into(), display_name: "A-1042".into(), bill_addr: None }))
        }

        async fn get_account(
            &self,
            _c: &AccessCredential,
            account_id: &str,
        ) -> Result<Option<AccountRef>> {
            Ok(Some(AccountRef {
                id: account_id.to_string(),
                name: "Trash Removal".into(),
                account_type: "Expense".into(),
            }))
        }

        async fn find_department_by_name(
            &self,
            _c: &AccessCredential,
            _f: &str,
        ) -> Result<Option<DepartmentRef>> {
            Ok(Some(DepartmentRef { id: "D1".into(), name: "Plant".into() }))
        }

        async fn find_bill_by_doc_number(
            &self,
            _c: &AccessCredential,
            _d: &str,
        ) -> Result<Option<BillRef>> {
            Ok(None)
        }

        async fn create_bill(
            &self,
            _c: &AccessCredential,
            bill: &LedgerBill,
        ) -> Result<BillRef> {
            let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(SyncError::Transient("ledger API returned 503".into()))
            } else {
                Ok(BillRef { id: "B1".into(), doc_number: bill.doc_number.clone() })
            }
        }
    }

    struct OneRealmStore(LedgerConnection);

    #[async_trait]
    impl ConnectionStore for OneRealmStore {
        async fn get_connection(&self, realm_id: &str) -> Result<Option<LedgerConnection>> {
            Ok((realm_id == self.0.realm_id).then(|| self.0.clone()))
        }

        async fn upsert_connection(&self, _connection: &LedgerConnection) -> Result<()> {
            Ok(())
        }

        async fn list_realms(&self) -> Result<Vec<String>> {
            Ok(vec![self.0.realm_id.clone()])
        }
    }

    struct UnusedAuthClient;

    #[async_trait]
    impl AuthorizationClient for UnusedAuthClient {
        fn authorization_url(&self, _state: &str) -> String {
            String::new()
        }

        async fn exchange_code(&self, _code: &str) -> Result<TokenExchangeResult> {
            Err(SyncError::Internal("unused".into()))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenExchangeResult> {
            Err(SyncError::Internal("unused".into()))
        }
    }

    struct NoopLockProvider;
    struct NoopLock;

    impl LockProvider for NoopLockProvider {
        fn create_lock(&self, _name: &str, _ttl: Duration) -> Arc<dyn DistributedLock> {
            Arc::new(NoopLock)
        }
    }

    #[async_trait]
    impl DistributedLock for NoopLock {
        async fn acquire(&self) -> Result<bool> {
            Ok(true)
        }

        async fn release(&self) -> Result<bool> {
            Ok(true)
        }

        async fn is_locked(&self) -> Result<bool> {
            Ok(false)
        }
    }

    fn record() -> BillingRecord {
        BillingRecord {
            id: "rec0012345".into(),
            bill_number: Some("0320-004595675".into()),
            status: Some("Send bill to QB".into()),
            status_detail: None,
            pdf_link: Some("https://files.example.com/bill.pdf".into()),
            bill_date: Some("2025-03-01".into()),
            due: Some("03/15/2025".into()),
            bill_amount: Some(412.50),
            hauler_number: Some("H-42".into()),
            customer_account: Some("Acme Corp - A-1042".into()),
            service_type: Some("Trash".into()),
            service_account: Some("SA-7".into()),
            terms_days: Some(30),
        }
    }

    fn runner_with(
        ledger: FlakyLedger,
        rec: BillingRecord,
        queue: Arc<MemoryQueue>,
    ) -> (JobRunner, Arc<FlakyLedger>) {
        let now = Utc::now();
        let connection = LedgerConnection {
            realm_id: "9130347".into(),
            environment: Environment::Sandbox,
            access_token: Some("AT".into()),
            access_token_expires_at: Some(now + ChronoDuration::hours(1)),
            refresh_token: Some("RT".into()),
            refresh_token_expires_at: None,
            scopes: None,
            updated_at: now,
        };
        let connections: Arc<dyn ConnectionStore> = Arc::new(OneRealmStore(connection));
        let credentials = Arc::new(CredentialManager::new(
            Arc::clone(&connections),
            Arc::new(UnusedAuthClient),
            Arc::new(NoopLockProvider),
            &WorkerConfig::default(),
        ));
        let ledger = Arc::new(ledger);
        let engine = Arc::new(BillSyncService::new(
            Arc::new(StubRecordStore { record: rec }),
            Arc::clone(&ledger) as Arc<dyn LedgerApi>,
            connections,
            credentials,
        ));
        let policy = RetryPolicy::new(&WorkerConfig::default());
        (JobRunner::new(queue, engine, policy), ledger)
    }

    /// Transient failures on attempts 1 and 2 and success on attempt 3
    /// produce exactly 3 executions and a final succeeded state.
    #[tokio::test]
    async fn transient_twice_then_success_runs_three_times() {
        let queue = Arc::new(MemoryQueue::new());
        let (runner, ledger) =
            runner_with(FlakyLedger { failures_before_success: 2, create_calls: AtomicUsize::new(0) }, record(), Arc::clone(&queue));

        let mut job = SyncJob::new("rec0012345");
        let mut verdicts = Vec::new();
        loop {
            let verdict = runner.process_job(&job).await;
            verdicts.push(verdict);
            match verdict {
                JobVerdict::Retry { .. } => {
                    let (queued, delay) = queue.delayed.lock().unwrap().pop().unwrap();
                    assert_eq!(delay, Duration::from_secs(180));
                    job = queued;
                }
                _ => break,
            }
        }

        assert_eq!(ledger.create_calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            verdicts,
            vec![
                JobVerdict::Retry { delay: Duration::from_secs(180) },
                JobVerdict::Retry { delay: Duration::from_secs(180) },
                JobVerdict::Succeeded,
            ]
        );
    }

    /// A persistent transient failure exhausts 3 attempts and becomes
    /// permanent.
    #[tokio::test]
    async fn transient_exhaustion_becomes_permanent() {
        let queue = Arc::new(MemoryQueue::new());
        let (runner, ledger) = runner_with(
            FlakyLedger { failures_before_success: usize::MAX, create_calls: AtomicUsize::new(0) },
            record(),
            Arc::clone(&queue),
        );

        let mut job = SyncJob::new("rec0012345");
        let mut last = runner.process_job(&job).await;
        while let JobVerdict::Retry { .. } = last {
            job = queue.delayed.lock().unwrap().pop().unwrap().0;
            last = runner.process_job(&job).await;
        }

        assert_eq!(last, JobVerdict::FailedPermanent);
        assert_eq!(ledger.create_calls.load(Ordering::SeqCst), 3);
        assert_eq!(job.attempt, 3);
    }

    /// A validation failure executes exactly once and fails permanently
    /// with nothing re-enqueued.
    #[tokio::test]
    async fn validation_fails_after_single_execution() {
        let queue = Arc::new(MemoryQueue::new());
        let mut rec = record();
        rec.hauler_number = None;
        let (runner, ledger) = runner_with(
            FlakyLedger { failures_before_success: 0, create_calls: AtomicUsize::new(0) },
            rec,
            Arc::clone(&queue),
        );

        let verdict = runner.process_job(&SyncJob::new("rec0012345")).await;

        assert_eq!(verdict, JobVerdict::FailedPermanent);
        assert_eq!(ledger.create_calls.load(Ordering::SeqCst), 0);
        assert!(queue.delayed.lock().unwrap().is_empty());
    }
}
