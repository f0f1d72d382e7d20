//! # BillBridge API
//!
//! Process wiring for the two binaries:
//! - `billbridge-server`: axum HTTP boundary (webhook + OAuth connect flow)
//! - `billbridge-worker`: queue consumer executing the sync pipeline
//!
//! Shared process-wide resources (database pool, broker connection, token
//! cipher, HTTP clients) are built once in [`AppContext`] and injected into
//! components; nothing reads the environment after startup.

pub mod context;
pub mod routes;
pub mod telemetry;

pub use context::AppContext;
pub use routes::router;
