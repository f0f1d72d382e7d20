//! Token lifecycle manager.
//!
//! Returns a currently-valid access credential for a realm, refreshing and
//! persisting when the stored access token is near expiry. Intuit rotates
//! the refresh token on every use, so at most one refresh exchange per realm
//! may be in flight across all worker processes at any instant; the
//! per-realm distributed lock enforces that, and callers that lose the lock
//! race wait for the winner's result instead of reusing the stale token.

use std::sync::Arc;
use std::time::Duration;

use billbridge_domain::{AccessCredential, LedgerConnection, Result, SyncError, WorkerConfig};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::ports::{AuthorizationClient, ConnectionStore, DistributedLock, LockProvider};

const LOCK_NAME_PREFIX: &str = "qbo:token";

/// Manages the access/refresh token pair for each connected realm.
pub struct CredentialManager {
    store: Arc<dyn ConnectionStore>,
    auth_client: Arc<dyn AuthorizationClient>,
    locks: Arc<dyn LockProvider>,
    refresh_window_seconds: i64,
    lock_ttl: Duration,
    lock_wait: Duration,
    lock_poll_interval: Duration,
}

impl CredentialManager {
    /// Create a manager wired to the given ports and timing configuration.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        auth_client: Arc<dyn AuthorizationClient>,
        locks: Arc<dyn LockProvider>,
        worker: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            auth_client,
            locks,
            refresh_window_seconds: worker.refresh_window_seconds,
            lock_ttl: Duration::from_secs(worker.lock_ttl_seconds),
            lock_wait: Duration::from_secs(worker.lock_wait_seconds),
            lock_poll_interval: Duration::from_millis(worker.lock_poll_interval_ms),
        }
    }

    /// Return a currently-valid credential for the realm.
    ///
    /// Fast path: when the stored access token is valid beyond the safety
    /// window, no lock is taken and no network call is made. Slow path: take
    /// the per-realm lock and run the refresh exchange, or wait for another
    /// process that is already running it.
    ///
    /// # Errors
    /// - [`SyncError::NotConnected`] when no connection row exists
    /// - [`SyncError::MissingRefreshToken`] when the row has no usable
    ///   refresh token
    /// - [`SyncError::Transient`] when another process holds the refresh
    ///   lock and no refreshed token appeared within the bounded wait
    pub async fn get_valid_credential(&self, realm_id: &str) -> Result<AccessCredential> {
        let connection = self.load_connection(realm_id).await?;
        let stale_refresh_token = connection
            .usable_refresh_token()
            .ok_or_else(|| SyncError::MissingRefreshToken(realm_id.to_string()))?
            .to_string();

        if !connection.needs_refresh(Utc::now(), self.refresh_window_seconds) {
            return credential_from(&connection);
        }

        let lock = self
            .locks
            .create_lock(&format!("{LOCK_NAME_PREFIX}:{realm_id}"), self.lock_ttl);

        if lock.acquire().await? {
            self.refresh_holding_lock(realm_id, lock.as_ref()).await
        } else {
            debug!(realm_id, "refresh lock held elsewhere, waiting for rotated token");
            self.wait_for_rotated_token(realm_id, &stale_refresh_token).await
        }
    }

    /// Persist the initial connection after a successful code exchange.
    ///
    /// Reconnection overwrites any previous row for the realm.
    pub async fn store_initial_connection(&self, connection: &LedgerConnection) -> Result<()> {
        self.store.upsert_connection(connection).await?;
        info!(realm_id = %connection.realm_id, "ledger connection stored");
        Ok(())
    }

    /// Refresh exchange while holding the per-realm lock.
    ///
    /// The connection is re-read under the lock: a racer may have completed
    /// its refresh between our staleness check and our acquisition, in which
    /// case its rotated pair is current and no exchange is needed.
    async fn refresh_holding_lock(
        &self,
        realm_id: &str,
        lock: &dyn DistributedLock,
    ) -> Result<AccessCredential> {
        let result = self.refresh_and_persist(realm_id).await;

        if !lock.release().await.unwrap_or(false) {
            // TTL expired mid-refresh; the persisted pair is still the newest.
            warn!(realm_id, "refresh lock was lost before release");
        }

        result
    }

    async fn refresh_and_persist(&self, realm_id: &str) -> Result<AccessCredential> {
        let connection = self.load_connection(realm_id).await?;

        if !connection.needs_refresh(Utc::now(), self.refresh_window_seconds) {
            debug!(realm_id, "token already refreshed by another worker");
            return credential_from(&connection);
        }

        let refresh_token = connection
            .usable_refresh_token()
            .ok_or_else(|| SyncError::MissingRefreshToken(realm_id.to_string()))?;

        let exchanged = self.auth_client.refresh(refresh_token).await?;
        let now = Utc::now();

        let updated = LedgerConnection {
            access_token: Some(exchanged.access_token.clone()),
            access_token_expires_at: Some(exchanged.access_expires_at(now)),
            refresh_token: Some(exchanged.refresh_token.clone()),
            refresh_token_expires_at: exchanged.refresh_expires_at(now),
            updated_at: now,
            ..connection
        };
        self.store.upsert_connection(&updated).await?;

        info!(realm_id, "access token refreshed and rotation persisted");
        credential_from(&updated)
    }

    /// Poll the store for the winner's rotated token, bounded by the
    /// configured wait.
    async fn wait_for_rotated_token(
        &self,
        realm_id: &str,
        stale_refresh_token: &str,
    ) -> Result<AccessCredential> {
        let deadline = tokio::time::Instant::now() + self.lock_wait;

        loop {
            tokio::time::sleep(self.lock_poll_interval).await;

            let connection = self.load_connection(realm_id).await?;
            let rotated = connection
                .usable_refresh_token()
                .map_or(false, |current| current != stale_refresh_token);

            if rotated && !connection.needs_refresh(Utc::now(), self.refresh_window_seconds) {
                debug!(realm_id, "observed rotated token from lock winner");
                return credential_from(&connection);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(SyncError::Transient(format!(
                    "refresh unavailable: another process holds the refresh lock for realm \
                     {realm_id} and no rotated token appeared within the wait"
                )));
            }
        }
    }

    async fn load_connection(&self, realm_id: &str) -> Result<LedgerConnection> {
        self.store
            .get_connection(realm_id)
            .await?
            .ok_or_else(|| SyncError::NotConnected(realm_id.to_string()))
    }
}

fn credential_from(connection: &LedgerConnection) -> Result<AccessCredential> {
    let access_token = connection
        .access_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SyncError::Internal("connection has no access token after refresh".into()))?;
    let refresh_token = connection
        .usable_refresh_token()
        .ok_or_else(|| SyncError::MissingRefreshToken(connection.realm_id.clone()))?
        .to_string();

    Ok(AccessCredential {
        realm_id: connection.realm_id.clone(),
        access_token,
        refresh_token,
        environment: connection.environment,
    })
}

#[cfg(test)]
mod tests {
    //! Unit tests for the token lifecycle manager.
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use billbridge_domain::{Environment, TokenExchangeResult};
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;

    struct MemoryStore {
        rows: Mutex<HashMap<String, LedgerConnection>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self { rows: Mutex::new(HashMap::new()) }
        }

        fn with(connection: LedgerConnection) -> Self {
            let store = Self::new();
            store.rows.lock().unwrap().insert(connection.realm_id.clone(), connection);
            store
        }
    }

    #[async_trait]
    impl ConnectionStore for MemoryStore {
        async fn get_connection(&self, realm_id: &str) -> Result<Option<LedgerConnection>> {
            Ok(self.rows.lock().unwrap().get(realm_id).cloned())
        }

        async fn upsert_connection(&self, connection: &LedgerConnection) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .insert(connection.realm_id.clone(), connection.clone());
            Ok(())
        }

        async fn list_realms(&self) -> Result<Vec<String>> {
            Ok(self.rows.lock().unwrap().keys().cloned().collect())
        }
    }

    struct CountingAuthClient {
        refresh_calls: AtomicUsize,
        delay: std::time::Duration,
    }

    impl CountingAuthClient {
        fn new() -> Self {
            Self { refresh_calls: AtomicUsize::new(0), delay: std::time::Duration::ZERO }
        }

        fn slow(delay: std::time::Duration) -> Self {
            Self { refresh_calls: AtomicUsize::new(0), delay }
        }
    }

    #[async_trait]
    impl AuthorizationClient for CountingAuthClient {
        fn authorization_url(&self, _state: &str) -> String {
            "https://appcenter.intuit.com/connect/oauth2".to_string()
        }

        async fn exchange_code(&self, _code: &str) -> Result<TokenExchangeResult> {
            unreachable!("not used in these tests")
        }

        async fn refresh(&self, refresh_token: &str) -> Result<TokenExchangeResult> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenExchangeResult {
                access_token: format!("AT-{call}-{refresh_token}"),
                access_expires_in: 3600,
                refresh_token: format!("RT-{call}"),
                refresh_expires_in: Some(8_640_000),
            })
        }
    }

    /// In-memory lock with real set-if-absent semantics shared across
    /// handles, so concurrent callers genuinely race.
    struct MemoryLockProvider {
        held: Arc<Mutex<HashMap<String, uuid::Uuid>>>,
        acquire_calls: Arc<AtomicUsize>,
    }

    impl MemoryLockProvider {
        fn new() -> Self {
            Self {
                held: Arc::new(Mutex::new(HashMap::new())),
                acquire_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct MemoryLock {
        name: String,
        owner: uuid::Uuid,
        held: Arc<Mutex<HashMap<String, uuid::Uuid>>>,
        acquire_calls: Arc<AtomicUsize>,
    }

    impl LockProvider for MemoryLockProvider {
        fn create_lock(&self, name: &str, _ttl: std::time::Duration) -> Arc<dyn DistributedLock> {
            Arc::new(MemoryLock {
                name: name.to_string(),
                owner: uuid::Uuid::new_v4(),
                held: Arc::clone(&self.held),
                acquire_calls: Arc::clone(&self.acquire_calls),
            })
        }
    }

    #[async_trait]
    impl DistributedLock for MemoryLock {
        async fn acquire(&self) -> Result<bool> {
            self.acquire_calls.fetch_add(1, Ordering::SeqCst);
            let mut held = self.held.lock().unwrap();
            if held.contains_key(&self.name) {
                Ok(false)
            } else {
                held.insert(self.name.clone(), self.owner);
                Ok(true)
            }
        }

        async fn release(&self) -> Result<bool> {
            let mut held = self.held.lock().unwrap();
            if held.get(&self.name) == Some(&self.owner) {
                held.remove(&self.name);
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn is_locked(&self) -> Result<bool> {
            Ok(self.held.lock().unwrap().contains_key(&self.name))
        }
    }

    fn connection(access_expires_in_secs: i64) -> LedgerConnection {
        let now = Utc::now();
        LedgerConnection {
            realm_id: "9130347".into(),
            environment: Environment::Sandbox,
            access_token: Some("AT-0".into()),
            access_token_expires_at: Some(now + ChronoDuration::seconds(access_expires_in_secs)),
            refresh_token: Some("RT-0".into()),
            refresh_token_expires_at: Some(now + ChronoDuration::days(100)),
            scopes: Some("com.intuit.quickbooks.accounting".into()),
            updated_at: now,
        }
    }

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            lock_wait_seconds: 1,
            lock_poll_interval_ms: 20,
            ..WorkerConfig::default()
        }
    }

    fn manager(
        store: Arc<MemoryStore>,
        auth: Arc<CountingAuthClient>,
        locks: Arc<MemoryLockProvider>,
    ) -> CredentialManager {
        CredentialManager::new(store, auth, locks, &worker_config())
    }

    /// For connections whose access token expires well beyond the safety
    /// window, no refresh exchange and no lock acquisition occurs.
    #[tokio::test]
    async fn fresh_token_skips_refresh_and_lock() {
        let store = Arc::new(MemoryStore::with(connection(3600)));
        let auth = Arc::new(CountingAuthClient::new());
        let locks = Arc::new(MemoryLockProvider::new());
        let mgr = manager(Arc::clone(&store), Arc::clone(&auth), Arc::clone(&locks));

        let cred = mgr.get_valid_credential("9130347").await.unwrap();

        assert_eq!(cred.access_token, "AT-0");
        assert_eq!(cred.refresh_token, "RT-0");
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(locks.acquire_calls.load(Ordering::SeqCst), 0);
    }

    /// A token inside the safety window triggers exactly one refresh and
    /// persists the rotated pair.
    #[tokio::test]
    async fn stale_token_refreshes_and_persists_rotation() {
        let store = Arc::new(MemoryStore::with(connection(60)));
        let auth = Arc::new(CountingAuthClient::new());
        let locks = Arc::new(MemoryLockProvider::new());
        let mgr = manager(Arc::clone(&store), Arc::clone(&auth), locks);

        let cred = mgr.get_valid_credential("9130347").await.unwrap();

        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cred.access_token, "AT-1-RT-0");
        assert_eq!(cred.refresh_token, "RT-1");

        let stored = store.get_connection("9130347").await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("RT-1"));
        assert!(stored.access_token_expires_at.unwrap() > Utc::now());
    }

    /// N concurrent callers for the same realm produce exactly one refresh
    /// exchange; losers observe the winner's rotated pair.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let store = Arc::new(MemoryStore::with(connection(60)));
        let auth = Arc::new(CountingAuthClient::slow(std::time::Duration::from_millis(50)));
        let locks = Arc::new(MemoryLockProvider::new());
        let mgr = Arc::new(manager(Arc::clone(&store), Arc::clone(&auth), locks));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = Arc::clone(&mgr);
            handles.push(tokio::spawn(async move { mgr.get_valid_credential("9130347").await }));
        }

        let mut credentials = Vec::new();
        for handle in handles {
            credentials.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);
        for cred in credentials {
            assert_eq!(cred.access_token, "AT-1-RT-0");
            assert_eq!(cred.refresh_token, "RT-1");
        }
    }

    /// A caller that loses the lock race and sees no rotated token within
    /// the bounded wait fails with a transient (retryable) error.
    #[tokio::test]
    async fn lock_loser_times_out_as_transient() {
        let store = Arc::new(MemoryStore::with(connection(60)));
        let auth = Arc::new(CountingAuthClient::new());
        let locks = Arc::new(MemoryLockProvider::new());

        // Simulate another process holding the lock and never finishing.
        let blocker = locks.create_lock("qbo:token:9130347", std::time::Duration::from_secs(10));
        assert!(blocker.acquire().await.unwrap());

        let mgr = manager(store, Arc::clone(&auth), locks);
        let err = mgr.get_valid_credential("9130347").await.unwrap_err();

        assert!(matches!(err, SyncError::Transient(_)));
        assert!(err.to_string().contains("refresh unavailable"));
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 0);
    }

    /// Unknown realms fail with `NotConnected`.
    #[tokio::test]
    async fn unknown_realm_is_not_connected() {
        let mgr = manager(
            Arc::new(MemoryStore::new()),
            Arc::new(CountingAuthClient::new()),
            Arc::new(MemoryLockProvider::new()),
        );

        let err = mgr.get_valid_credential("0000000").await.unwrap_err();
        assert!(matches!(err, SyncError::NotConnected(_)));
    }

    /// A connection row without a refresh token fails with
    /// `MissingRefreshToken` before any lock or network activity.
    #[tokio::test]
    async fn missing_refresh_token_fails_fast() {
        let mut conn = connection(60);
        conn.refresh_token = None;
        let locks = Arc::new(MemoryLockProvider::new());
        let auth = Arc::new(CountingAuthClient::new());
        let mgr = manager(Arc::new(MemoryStore::with(conn)), Arc::clone(&auth), Arc::clone(&locks));

        let err = mgr.get_valid_credential("9130347").await.unwrap_err();

        assert!(matches!(err, SyncError::MissingRefreshToken(_)));
        assert_eq!(locks.acquire_calls.load(Ordering::SeqCst), 0);
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 0);
    }
}
