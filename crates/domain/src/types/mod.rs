//! Domain types and models.

pub mod billing;
pub mod connection;
pub mod jobs;
pub mod status_detail;

pub use billing::{BillRequest, BillStatus, BillingRecord, ServiceType};
pub use connection::{AccessCredential, Environment, LedgerConnection, TokenExchangeResult};
pub use jobs::SyncJob;
pub use status_detail::StatusDetail;
