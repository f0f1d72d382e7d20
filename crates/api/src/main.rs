//! BillBridge HTTP server.
//!
//! Hosts the webhook receiver and the QuickBooks connect flow. Sync work is
//! only enqueued here; the worker binary executes it.

use std::sync::Arc;

use anyhow::Context;
use billbridge_api::{router, AppContext};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    billbridge_api::telemetry::init("billbridge-server");

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!("no .env file, relying on process environment"),
    }

    let config = billbridge_infra::config::load().context("configuration failed to load")?;
    let port = config.http.port;

    let ctx = Arc::new(AppContext::new(config).await.context("application context failed")?);
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "billbridge server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("billbridge server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for shutdown signal");
    }
}
