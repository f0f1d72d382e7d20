//! Port interfaces for sync operations.

use async_trait::async_trait;
use billbridge_domain::{AccessCredential, BillStatus, BillingRecord, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trait for the external record store holding billing records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a billing record by identifier; absent records are a
    /// `NotFound` error, not `None`, because the caller cannot proceed
    /// without one.
    async fn fetch_billing_record(&self, record_id: &str) -> Result<BillingRecord>;

    /// Write status and status-detail together, exactly once per attempt.
    /// Success clears the detail to the empty string.
    async fn save_status(&self, record_id: &str, status: BillStatus, detail: &str) -> Result<()>;
}

/// Resolved ledger vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRef {
    pub id: String,
    pub display_name: String,
}

/// Resolved ledger customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: String,
    pub display_name: String,
    /// Rendered billing address, used as the line description.
    pub bill_addr: Option<String>,
}

/// Resolved ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: String,
    pub name: String,
    pub account_type: String,
}

/// Resolved ledger department (location).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRef {
    pub id: String,
    pub name: String,
}

/// An existing or newly created ledger bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillRef {
    pub id: String,
    pub doc_number: String,
}

/// Single expense line on a bill request.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerLine {
    pub amount: f64,
    pub description: String,
    pub expense_account_id: String,
    pub expense_account_name: String,
    pub customer_id: String,
    pub customer_name: String,
}

/// The ledger transaction this pipeline creates: one bill, one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerBill {
    pub doc_number: String,
    pub vendor_id: String,
    pub txn_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Link back to the source document.
    pub private_note: String,
    pub department_id: Option<String>,
    pub term_id: String,
    pub line: LedgerLine,
}

/// Trait for the ledger API (QuickBooks Online).
///
/// `find_*` methods run query-by-filter requests and return `None` on zero
/// results; classifying zero results is the engine's job, not the
/// adapter's. HTTP failures are classified by the adapter per the error
/// taxonomy (rate limit/5xx/timeout → transient, anything else →
/// validation).
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Vendor whose display name matches the hauler's vendor-reference key.
    async fn find_vendor(
        &self,
        credential: &AccessCredential,
        hauler_number: &str,
    ) -> Result<Option<VendorRef>>;

    /// Customer whose display name contains the given fragment.
    async fn find_customer_by_display_name(
        &self,
        credential: &AccessCredential,
        fragment: &str,
    ) -> Result<Option<CustomerRef>>;

    /// Account by ledger identifier.
    async fn get_account(
        &self,
        credential: &AccessCredential,
        account_id: &str,
    ) -> Result<Option<AccountRef>>;

    /// Department whose name contains the given fragment.
    async fn find_department_by_name(
        &self,
        credential: &AccessCredential,
        fragment: &str,
    ) -> Result<Option<DepartmentRef>>;

    /// Existing bill with the given document number, for idempotency.
    async fn find_bill_by_doc_number(
        &self,
        credential: &AccessCredential,
        doc_number: &str,
    ) -> Result<Option<BillRef>>;

    /// Create the bill.
    async fn create_bill(
        &self,
        credential: &AccessCredential,
        bill: &LedgerBill,
    ) -> Result<BillRef>;
}
