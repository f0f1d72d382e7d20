//! Inbound HTTP boundary.
//!
//! Three endpoints plus a health root:
//! - `POST /bills/webhook` — accept a notification, enqueue a sync job,
//!   reply immediately. The reply never reflects the eventual sync outcome;
//!   the record's status field is the source of truth. Only queue
//!   availability is surfaced (503).
//! - `GET /qbo/connect` — redirect the browser to Intuit's authorization
//!   page.
//! - `GET /qbo/callback` — complete the code exchange and persist the
//!   initial connection.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use billbridge_domain::{LedgerConnection, SyncError, SyncJob};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::AppContext;

/// Build the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/bills/webhook", post(webhook))
        .route("/qbo/connect", get(qbo_connect))
        .route("/qbo/callback", get(qbo_callback))
        .with_state(ctx)
}

/// Inbound webhook body; unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    /// Billing-record identifier to synchronize.
    pub id: String,
}

/// OAuth callback parameters as Intuit sends them.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    #[serde(rename = "realmId")]
    pub realm_id: String,
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "app": "billbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health(State(ctx): State<Arc<AppContext>>) -> Response {
    match ctx.db.health_check() {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "healthy"}))).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "error": err.to_string()})),
        )
            .into_response(),
    }
}

async fn webhook(
    State(ctx): State<Arc<AppContext>>,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    let job = SyncJob::new(&payload.id);
    match ctx.queue.enqueue(&job).await {
        Ok(()) => {
            info!(record_id = %payload.id, job_id = %job.job_id, "webhook accepted, job enqueued");
            (
                StatusCode::ACCEPTED,
                Json(json!({"message": "Webhook received", "record_id": payload.id})),
            )
                .into_response()
        }
        Err(err) => {
            warn!(record_id = %payload.id, error = %err, "queue backend unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "queue backend unavailable, retry later"})),
            )
                .into_response()
        }
    }
}

async fn qbo_connect(State(ctx): State<Arc<AppContext>>) -> Redirect {
    let state = Uuid::new_v4().to_string();
    Redirect::temporary(&ctx.auth_client.authorization_url(&state))
}

async fn qbo_callback(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let exchanged = ctx.auth_client.exchange_code(&params.code).await?;
    let now = Utc::now();

    let connection = LedgerConnection {
        realm_id: params.realm_id.clone(),
        environment: ctx.config.quickbooks.environment,
        access_token: Some(exchanged.access_token.clone()),
        access_token_expires_at: Some(exchanged.access_expires_at(now)),
        refresh_token: Some(exchanged.refresh_token.clone()),
        refresh_token_expires_at: exchanged.refresh_expires_at(now),
        scopes: Some("com.intuit.quickbooks.accounting".to_string()),
        updated_at: now,
    };
    ctx.credentials.store_initial_connection(&connection).await?;

    Ok(Json(json!({
        "message": "QuickBooks Online connected successfully",
        "realm_id": params.realm_id,
    })))
}

/// Maps the domain taxonomy onto HTTP responses.
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}
