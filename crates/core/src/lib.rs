//! # BillBridge Core
//!
//! Business logic implemented against port traits:
//! - `auth`: OAuth token lifecycle manager and its ports (connection store,
//!   authorization client, distributed lock)
//! - `sync`: the billing-record → ledger-bill pipeline and its ports
//!   (record store, ledger API)
//! - `jobs`: the retry policy and the queue worker loop
//!
//! ## Architecture
//! - Defines the traits implemented by `billbridge-infra`
//! - No I/O of its own; every external effect goes through a port

pub mod auth;
pub mod jobs;
pub mod sync;
