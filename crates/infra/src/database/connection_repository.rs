//! Ledger connection repository.
//!
//! Implements the core `ConnectionStore` port on SQLite. Token columns are
//! encrypted with the process-wide [`TokenCipher`] on write and decrypted on
//! read, so plaintext token material never reaches the database file and
//! ciphertext never crosses the port boundary. Timestamps are stored as
//! RFC 3339 strings; values without an offset are interpreted as UTC on
//! read.

use std::sync::Arc;

use async_trait::async_trait;
use billbridge_common::crypto::TokenCipher;
use billbridge_core::auth::ConnectionStore;
use billbridge_domain::{Environment, LedgerConnection, Result, SyncError};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::{DbConnection, DbManager};
use crate::errors::InfraError;

/// SQLite-backed connection store with encrypted token columns.
pub struct SqliteConnectionStore {
    db: Arc<DbManager>,
    cipher: Arc<TokenCipher>,
}

impl SqliteConnectionStore {
    pub fn new(db: Arc<DbManager>, cipher: Arc<TokenCipher>) -> Self {
        Self { db, cipher }
    }
}

#[async_trait]
impl ConnectionStore for SqliteConnectionStore {
    async fn get_connection(&self, realm_id: &str) -> Result<Option<LedgerConnection>> {
        let db = Arc::clone(&self.db);
        let cipher = Arc::clone(&self.cipher);
        let realm_id = realm_id.to_string();

        task::spawn_blocking(move || -> Result<Option<LedgerConnection>> {
            let conn = db.get_connection()?;
            let row = query_connection(&conn, &realm_id)?;
            row.map(|stored| stored.into_decrypted(&cipher)).transpose()
        })
        .await
        .map_err(InfraError::from)?
    }

    async fn upsert_connection(&self, connection: &LedgerConnection) -> Result<()> {
        let db = Arc::clone(&self.db);
        let cipher = Arc::clone(&self.cipher);
        let connection = connection.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            upsert_connection(&conn, &cipher, &connection)
        })
        .await
        .map_err(InfraError::from)?
    }

    async fn list_realms(&self) -> Result<Vec<String>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = db.get_connection()?;
            list_realms(&conn)
        })
        .await
        .map_err(InfraError::from)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

/// Row shape as stored: token columns still ciphertext.
struct StoredConnection {
    realm_id: String,
    environment: String,
    access_token: Option<String>,
    access_token_expires_at: Option<String>,
    refresh_token: String,
    refresh_token_expires_at: Option<String>,
    scopes: Option<String>,
    updated_at: String,
}

impl StoredConnection {
    fn into_decrypted(self, cipher: &TokenCipher) -> Result<LedgerConnection> {
        let environment = Environment::parse(&self.environment).ok_or_else(|| {
            SyncError::Internal(format!(
                "connection row for realm {} has unknown environment {:?}",
                self.realm_id, self.environment
            ))
        })?;

        let access_token = self
            .access_token
            .as_deref()
            .map(|ciphertext| cipher.decrypt_str(ciphertext))
            .transpose()
            .map_err(InfraError::from)?;
        let refresh_token =
            Some(cipher.decrypt_str(&self.refresh_token).map_err(InfraError::from)?);

        Ok(LedgerConnection {
            realm_id: self.realm_id,
            environment,
            access_token,
            access_token_expires_at: self
                .access_token_expires_at
                .as_deref()
                .map(parse_utc)
                .transpose()?,
            refresh_token,
            refresh_token_expires_at: self
                .refresh_token_expires_at
                .as_deref()
                .map(parse_utc)
                .transpose()?,
            scopes: self.scopes,
            updated_at: parse_utc(&self.updated_at)?,
        })
    }
}

fn query_connection(conn: &DbConnection, realm_id: &str) -> Result<Option<StoredConnection>> {
    let sql = "SELECT realm_id, environment, access_token, access_token_expires_at,
                      refresh_token, refresh_token_expires_at, scopes, updated_at
               FROM ledger_connections
               WHERE realm_id = ?1";

    let mut stmt = conn.prepare(sql).map_err(InfraError::from)?;
    let mut rows = stmt
        .query_map(params![realm_id], map_stored_row)
        .map_err(InfraError::from)?;

    rows.next().transpose().map_err(InfraError::from).map_err(SyncError::from)
}

fn upsert_connection(
    conn: &DbConnection,
    cipher: &TokenCipher,
    connection: &LedgerConnection,
) -> Result<()> {
    let refresh_plain = connection
        .usable_refresh_token()
        .ok_or_else(|| SyncError::MissingRefreshToken(connection.realm_id.clone()))?;

    let access_cipher = connection
        .access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| cipher.encrypt_str(t))
        .transpose()
        .map_err(InfraError::from)?;
    let refresh_cipher = cipher.encrypt_str(refresh_plain).map_err(InfraError::from)?;

    conn.execute(
        "INSERT INTO ledger_connections (realm_id, environment, access_token,
                                         access_token_expires_at, refresh_token,
                                         refresh_token_expires_at, scopes, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(realm_id) DO UPDATE SET
             environment = excluded.environment,
             access_token = excluded.access_token,
             access_token_expires_at = excluded.access_token_expires_at,
             refresh_token = excluded.refresh_token,
             refresh_token_expires_at = excluded.refresh_token_expires_at,
             scopes = excluded.scopes,
             updated_at = excluded.updated_at",
        params![
            connection.realm_id,
            connection.environment.as_str(),
            access_cipher,
            connection.access_token_expires_at.map(|t| t.to_rfc3339()),
            refresh_cipher,
            connection.refresh_token_expires_at.map(|t| t.to_rfc3339()),
            connection.scopes,
            connection.updated_at.to_rfc3339(),
        ],
    )
    .map_err(InfraError::from)?;
    Ok(())
}

fn list_realms(conn: &DbConnection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT realm_id FROM ledger_connections ORDER BY updated_at ASC")
        .map_err(InfraError::from)?;
    let realms = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(InfraError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(InfraError::from)?;
    Ok(realms)
}

fn map_stored_row(row: &Row<'_>) -> rusqlite::Result<StoredConnection> {
    Ok(StoredConnection {
        realm_id: row.get(0)?,
        environment: row.get(1)?,
        access_token: row.get(2)?,
        access_token_expires_at: row.get(3)?,
        refresh_token: row.get(4)?,
        refresh_token_expires_at: row.get(5)?,
        scopes: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Parse a stored timestamp; naive values are interpreted as UTC.
fn parse_utc(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| SyncError::Internal(format!("unparseable stored timestamp: {value:?}")))
}

// ============================================================================
// Tests
// ============================================================================
