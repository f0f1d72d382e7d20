//! QuickBooks Online integration: ledger API client and OAuth client.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::IntuitAuthClient;
pub use client::QboApiClient;
