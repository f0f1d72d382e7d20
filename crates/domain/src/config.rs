//! Configuration structures.
//!
//! Typed configuration for both binaries. Values are loaded by the infra
//! config loader (environment first, TOML file fallback) and validated once
//! at startup; components receive the structs by injection rather than
//! reading the environment themselves.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOCK_POLL_INTERVAL_MS, DEFAULT_LOCK_TTL_SECS, DEFAULT_LOCK_WAIT_SECS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REFRESH_SAFETY_WINDOW_SECS, DEFAULT_RETRY_DELAY_SECS,
};
use crate::errors::{Result, SyncError};
use crate::types::Environment;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub http: HttpConfig,
    pub quickbooks: QuickBooksConfig,
    pub record_store: RecordStoreConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    /// 64 hex characters; the 32-byte AES key that encrypts stored tokens.
    /// Startup fails when absent or malformed.
    pub token_key: String,
}

/// SQLite connection store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Shared key-value store settings (lock + queue broker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Inbound HTTP boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// QuickBooks OAuth application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickBooksConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub environment: Environment,
}

/// Record store (Airtable) API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    pub token: String,
    pub base_id: String,
}

/// Worker and token lifecycle timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Lead time before access-token expiry that forces a refresh.
    pub refresh_window_seconds: i64,
    /// Time-to-live on the per-realm refresh lock.
    pub lock_ttl_seconds: u64,
    /// How long a lock loser waits for the winner's refreshed token.
    pub lock_wait_seconds: u64,
    /// Poll interval while waiting on the winner.
    pub lock_poll_interval_ms: u64,
    /// Fixed re-enqueue delay for transient failures.
    pub retry_delay_seconds: u64,
    /// Maximum attempts per job, first execution included.
    pub max_attempts: u32,
    /// Concurrent job slots per worker process.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            refresh_window_seconds: DEFAULT_REFRESH_SAFETY_WINDOW_SECS,
            lock_ttl_seconds: DEFAULT_LOCK_TTL_SECS,
            lock_wait_seconds: DEFAULT_LOCK_WAIT_SECS,
            lock_poll_interval_ms: DEFAULT_LOCK_POLL_INTERVAL_MS,
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            concurrency: 4,
        }
    }
}

impl Config {
    /// Validate cross-field invariants after loading.
    pub fn validate(&self) -> Result<()> {
        let key = self.token_key.trim();
        if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SyncError::Validation(
                "token_key must be 64 hex characters (32 bytes)".into(),
            ));
        }
        if self.worker.max_attempts == 0 {
            return Err(SyncError::Validation("worker.max_attempts must be at least 1".into()));
        }
        if self.worker.concurrency == 0 {
            return Err(SyncError::Validation("worker.concurrency must be at least 1".into()));
        }
        if self.database.pool_size == 0 {
            return Err(SyncError::Validation("database.pool_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_pool_size() -> u32 {
    4
}

fn default_http_port() -> u16 {
    8080
}
