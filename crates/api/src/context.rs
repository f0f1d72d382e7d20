//! Application context: explicit process-wide resources.

use std::sync::Arc;

use billbridge_common::crypto::TokenCipher;
use billbridge_core::auth::{AuthorizationClient, ConnectionStore, CredentialManager};
use billbridge_core::jobs::JobQueue;
use billbridge_core::sync::BillSyncService;
use billbridge_domain::{Config, Result, SyncError};
use billbridge_infra::{
    AirtableRecordStore, DbManager, HttpClient, InfraError, IntuitAuthClient, QboApiClient,
    RedisJobQueue, RedisLockProvider, SqliteConnectionStore,
};
use redis::aio::ConnectionManager;
use tracing::info;

/// Everything a binary needs, constructed once at startup and injected.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub queue: Arc<dyn JobQueue>,
    pub connections: Arc<dyn ConnectionStore>,
    pub credentials: Arc<CredentialManager>,
    pub auth_client: Arc<dyn AuthorizationClient>,
    pub engine: Arc<BillSyncService>,
}

impl AppContext {
    /// Build the full dependency graph.
    ///
    /// Fails fast on an absent or malformed token key, an unreachable
    /// broker, or a database that cannot be opened and migrated.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let cipher = Arc::new(TokenCipher::from_hex(&config.token_key).map_err(|e| {
            SyncError::Validation(format!("BILLBRIDGE_TOKEN_KEY is not a usable key: {e}"))
        })?);
        info!(key_fingerprint = %cipher.key_fingerprint(), "token cipher initialised");

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let redis_client =
            redis::Client::open(config.redis.url.as_str()).map_err(InfraError::from)?;
        let redis_conn = ConnectionManager::new(redis_client).await.map_err(InfraError::from)?;
        info!(url = %config.redis.url, "connected to key-value store");

        let http = HttpClient::builder()
            .user_agent(concat!("billbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let connections: Arc<dyn ConnectionStore> =
            Arc::new(SqliteConnectionStore::new(Arc::clone(&db), cipher));
        let locks = Arc::new(RedisLockProvider::new(redis_conn.clone()));
        let auth_client: Arc<dyn AuthorizationClient> =
            Arc::new(IntuitAuthClient::new(http.clone(), &config.quickbooks));

        let credentials = Arc::new(CredentialManager::new(
            Arc::clone(&connections),
            Arc::clone(&auth_client),
            locks,
            &config.worker,
        ));

        let records = Arc::new(AirtableRecordStore::new(http.clone(), &config.record_store));
        let ledger = Arc::new(QboApiClient::new(http, config.quickbooks.environment));
        let engine = Arc::new(BillSyncService::new(
            records,
            ledger,
            Arc::clone(&connections),
            Arc::clone(&credentials),
        ));

        let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(redis_conn));

        Ok(Self { config, db, queue, connections, credentials, auth_client, engine })
    }
}
