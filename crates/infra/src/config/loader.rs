//! Configuration loader.
//!
//! Loads application configuration from environment variables or a TOML
//! file.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from `billbridge.toml` (or an
//!    explicit path)
//!
//! ## Environment Variables
//! - `BILLBRIDGE_DATABASE_PATH`: connection store database file
//! - `BILLBRIDGE_DATABASE_POOL_SIZE`: pool size (default 4)
//! - `BILLBRIDGE_REDIS_URL`: shared key-value store URL
//! - `BILLBRIDGE_HTTP_PORT`: inbound HTTP port (default 8080)
//! - `BILLBRIDGE_TOKEN_KEY`: 64 hex chars keying the token cipher;
//!   startup fails when absent
//! - `QBO_CLIENT_ID` / `QBO_CLIENT_SECRET` / `QBO_REDIRECT_URI` /
//!   `QBO_ENVIRONMENT`: QuickBooks application settings
//! - `AIRTABLE_TOKEN` / `AIRTABLE_BASE_ID`: record store settings

use std::path::{Path, PathBuf};

use billbridge_domain::{
    Config, DatabaseConfig, Environment, HttpConfig, QuickBooksConfig, RecordStoreConfig,
    RedisConfig, Result, SyncError, WorkerConfig,
};

const CONFIG_FILE: &str = "billbridge.toml";

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `SyncError::Validation` when neither source yields a complete,
/// valid configuration.
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            config
        }
        Err(env_err) => {
            tracing::debug!(error = %env_err, "environment incomplete, trying config file");
            load_from_file(None)?
        }
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables only.
pub fn load_from_env() -> Result<Config> {
    let database = DatabaseConfig {
        path: env_var("BILLBRIDGE_DATABASE_PATH")?,
        pool_size: env_parse("BILLBRIDGE_DATABASE_POOL_SIZE", 4)?,
    };
    let redis = RedisConfig { url: env_var("BILLBRIDGE_REDIS_URL")? };
    let http = HttpConfig { port: env_parse("BILLBRIDGE_HTTP_PORT", 8080)? };

    let environment_tag = env_var("QBO_ENVIRONMENT")?;
    let environment = Environment::parse(&environment_tag).ok_or_else(|| {
        SyncError::Validation(format!(
            "QBO_ENVIRONMENT must be 'sandbox' or 'production', got {environment_tag:?}"
        ))
    })?;

    let quickbooks = QuickBooksConfig {
        client_id: env_var("QBO_CLIENT_ID")?,
        client_secret: env_var("QBO_CLIENT_SECRET")?,
        redirect_uri: env_var("QBO_REDIRECT_URI")?,
        environment,
    };

    let record_store = RecordStoreConfig {
        token: env_var("AIRTABLE_TOKEN")?,
        base_id: env_var("AIRTABLE_BASE_ID")?,
    };

    Ok(Config {
        database,
        redis,
        http,
        quickbooks,
        record_store,
        worker: WorkerConfig::default(),
        token_key: env_var("BILLBRIDGE_TOKEN_KEY")?,
    })
}

/// Load configuration from a TOML file.
///
/// With no explicit path, probes `./billbridge.toml` and the parent
/// directory.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SyncError::Validation(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SyncError::Validation(
                "no configuration: set the BILLBRIDGE_* environment variables or provide \
                 billbridge.toml"
                    .into(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SyncError::Validation(format!("failed to read config file: {e}")))?;
    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    toml::from_str(contents).map_err(|e| {
        SyncError::Validation(format!("invalid TOML in {}: {e}", path.display()))
    })
}

fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(CONFIG_FILE));
        candidates.push(cwd.join("..").join(CONFIG_FILE));
    }
    candidates.into_iter().find(|p| p.exists())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| SyncError::Validation(format!("missing environment variable {name}")))
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| SyncError::Validation(format!("invalid value for {name}: {raw:?}"))),
        Err(_) => Ok(default),
    }
}
