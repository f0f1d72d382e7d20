//! Logging setup shared by both binaries.

use tracing_subscriber::EnvFilter;

/// Initialise the tracing subscriber.
///
/// Honours `RUST_LOG`; defaults to `info` for the workspace crates and
/// `warn` for everything else.
pub fn init(binary: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,billbridge=info,billbridge_api=info,billbridge_core=info,billbridge_infra=info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    tracing::info!(binary, version = env!("CARGO_PKG_VERSION"), "logging initialised");
}
