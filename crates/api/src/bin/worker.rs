//! BillBridge queue worker.
//!
//! Runs a pool of execution slots, each consuming sync jobs from the shared
//! queue. Multiple worker processes may run concurrently; the per-realm
//! refresh lock keeps token rotation safe across all of them.

use std::sync::Arc;

use anyhow::Context;
use billbridge_api::AppContext;
use billbridge_core::jobs::{JobRunner, RetryPolicy};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    billbridge_api::telemetry::init("billbridge-worker");

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!("no .env file, relying on process environment"),
    }

    let config = billbridge_infra::config::load().context("configuration failed to load")?;
    let concurrency = config.worker.concurrency.max(1);
    let policy = RetryPolicy::new(&config.worker);

    let ctx = Arc::new(AppContext::new(config).await.context("application context failed")?);
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&ctx.queue),
        Arc::clone(&ctx.engine),
        policy,
    ));

    info!(concurrency, "billbridge worker starting");

    let mut slots = Vec::with_capacity(concurrency);
    for slot in 0..concurrency {
        let runner = Arc::clone(&runner);
        slots.push(tokio::spawn(async move {
            info!(slot, "execution slot started");
            runner.run().await;
        }));
    }

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, stopping worker");

    for slot in slots {
        slot.abort();
    }

    Ok(())
}
