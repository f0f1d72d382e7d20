//! Ledger connection and credential types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// QuickBooks environment a realm is connected against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Parse the stored environment tag.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sandbox" => Some(Self::Sandbox),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger connection per QuickBooks realm.
///
/// Token fields hold *plaintext* values at this layer; the connection store
/// encrypts on write and decrypts on read, so ciphertext never crosses the
/// port boundary and plaintext never reaches storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConnection {
    /// QuickBooks calls this the "realmId" (aka company id).
    pub realm_id: String,
    pub environment: Environment,
    /// Current access token, absent until the first refresh.
    pub access_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    /// Refresh token; rotates on every use on Intuit's side.
    pub refresh_token: Option<String>,
    /// Approximately 100 days after the last refresh.
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub scopes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerConnection {
    /// Whether the access token must be refreshed before use.
    ///
    /// True when the token is absent, has no declared expiry, or expires
    /// within the safety window of `now`.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, safety_window_seconds: i64) -> bool {
        if self.access_token.as_deref().map_or(true, str::is_empty) {
            return true;
        }
        match self.access_token_expires_at {
            Some(expires_at) => now + Duration::seconds(safety_window_seconds) >= expires_at,
            None => true,
        }
    }

    /// Refresh token value, if one is usable.
    #[must_use]
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// What the token lifecycle manager hands to callers.
#[derive(Debug, Clone)]
pub struct AccessCredential {
    pub realm_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub environment: Environment,
}

/// Normalized result of an authorization-server exchange.
///
/// The external SDKs disagree on field names for the token lifetimes
/// (`expires_in`, `x_refresh_token_expires_in`, ...); the authorization
/// client adapter maps whichever names it receives onto this one shape so
/// the ambiguity stays in one translation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExchangeResult {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub access_expires_in: i64,
    pub refresh_token: String,
    /// Refresh token lifetime in seconds, when the server reports one.
    pub refresh_expires_in: Option<i64>,
}

impl TokenExchangeResult {
    /// Absolute access-token expiry relative to `now`.
    #[must_use]
    pub fn access_expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.access_expires_in)
    }

    /// Absolute refresh-token expiry relative to `now`, when reported.
    #[must_use]
    pub fn refresh_expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.refresh_expires_in.map(|secs| now + Duration::seconds(secs))
    }
}
