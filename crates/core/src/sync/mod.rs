//! Billing-record synchronization pipeline.

pub mod engine;
pub mod ports;

pub use engine::BillSyncService;
pub use ports::{
    AccountRef, BillRef, CustomerRef, DepartmentRef, LedgerApi, LedgerBill, LedgerLine,
    RecordStore, VendorRef,
};
