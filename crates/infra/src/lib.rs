//! # BillBridge Infrastructure
//!
//! Infrastructure implementations of the core domain ports.
//!
//! This crate contains:
//! - SQLite connection store (encrypted token persistence)
//! - Redis distributed lock and job queue broker
//! - HTTP clients: QuickBooks Online, Intuit OAuth, Airtable record store
//! - Configuration loader
//!
//! ## Architecture
//! - Implements traits defined in `billbridge-core`
//! - Contains all "impure" code (network, disk, broker)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod lock;
pub mod queue;

pub use database::{DbManager, SqliteConnectionStore};
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::airtable::AirtableRecordStore;
pub use integrations::qbo::{IntuitAuthClient, QboApiClient};
pub use lock::{RedisLock, RedisLockProvider};
pub use queue::RedisJobQueue;
