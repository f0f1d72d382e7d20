//! The billing-record → ledger-bill pipeline.
//!
//! Each step short-circuits into the error taxonomy, and every attempt ends
//! in exactly one status write-back onto the source record: either the
//! success status with a cleared detail, or the issue status with a rendered
//! [`StatusDetail`]. The write-back happens in a single finalization path so
//! no step can skip it, and a failing write-back never masks the original
//! pipeline error.

use std::sync::Arc;

use billbridge_domain::constants::{
    expense_account_for, term_for_days, DEFAULT_EXPENSE_ACCOUNT_ID, DEFAULT_TERM_ID,
};
use billbridge_domain::{
    AccessCredential, BillRequest, BillStatus, BillingRecord, ErrorKind, Result, StatusDetail,
    SyncError,
};
use tracing::{info, warn};

use super::ports::{LedgerApi, LedgerBill, LedgerLine, RecordStore};
use crate::auth::{ConnectionStore, CredentialManager};

/// Account types QuickBooks accepts on an expense line.
const EXPENSE_ACCOUNT_TYPES: [&str; 2] = ["Expense", "Cost of Goods Sold"];

/// Converts one billing record into one ledger bill.
pub struct BillSyncService {
    records: Arc<dyn RecordStore>,
    ledger: Arc<dyn LedgerApi>,
    connections: Arc<dyn ConnectionStore>,
    credentials: Arc<CredentialManager>,
}

impl BillSyncService {
    /// Create a service wired to the given ports.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        ledger: Arc<dyn LedgerApi>,
        connections: Arc<dyn ConnectionStore>,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        Self { records, ledger, connections, credentials }
    }

    /// Synchronize one billing record into the ledger.
    ///
    /// Side effect on success: a ledger bill exists (created now, or
    /// confirmed as an existing duplicate) and the record is marked
    /// `Bill in QB` with a cleared detail. On failure the record is marked
    /// `Issue sending to QB` with a diagnostic detail and the classified
    /// error is returned to the caller for retry policy.
    pub async fn sync(&self, record_id: &str, realm_id: Option<&str>) -> Result<()> {
        let record = self.records.fetch_billing_record(record_id).await?;
        let outcome = self.process(&record, realm_id).await;
        self.finalize(record_id, &record, outcome).await
    }

    /// Steps 2–7 of the pipeline; no status writes happen in here.
    async fn process(&self, record: &BillingRecord, realm_id: Option<&str>) -> Result<()> {
        // Fail-fast validation before any external call.
        let request = BillRequest::from_record(record)?;

        let realm = match realm_id {
            Some(realm) => realm.to_string(),
            None => self.default_realm().await?,
        };

        let credential = self.credentials.get_valid_credential(&realm).await?;

        let vendor = self
            .ledger
            .find_vendor(&credential, &request.hauler_number)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "Vendor (Hauler) '{}' not found in QuickBooks",
                    request.hauler_number
                ))
            })?;

        let fragment = request.customer_search_fragment();
        let customer = self
            .ledger
            .find_customer_by_display_name(&credential, fragment)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "Customer with display name {} not found",
                    request.customer_account
                ))
            })?;

        let account = self.resolve_expense_account(&credential, &request).await?;

        let department = self
            .ledger
            .find_department_by_name(&credential, &request.service_account)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "No department found for service account {}",
                    request.service_account
                ))
            })?;

        let term_id = term_for_days(request.terms_days).unwrap_or(DEFAULT_TERM_ID);

        // Idempotency: tolerate duplicate enqueues and retried creates.
        if let Some(existing) = self
            .ledger
            .find_bill_by_doc_number(&credential, &request.bill_number)
            .await?
        {
            info!(
                record_id = %record.id,
                doc_number = %existing.doc_number,
                bill_id = %existing.id,
                "bill already exists in ledger, skipping create"
            );
            return Ok(());
        }

        let bill = LedgerBill {
            doc_number: request.bill_number.clone(),
            vendor_id: vendor.id,
            txn_date: request.bill_date,
            due_date: request.due,
            private_note: request.pdf_link.clone(),
            department_id: Some(department.id),
            term_id: term_id.to_string(),
            line: LedgerLine {
                amount: request.total_amount,
                description: customer.bill_addr.unwrap_or_default(),
                expense_account_id: account.id,
                expense_account_name: account.name,
                customer_id: customer.id,
                customer_name: customer.display_name,
            },
        };

        let created = self.ledger.create_bill(&credential, &bill).await?;
        info!(
            record_id = %record.id,
            doc_number = %created.doc_number,
            bill_id = %created.id,
            "bill created in ledger"
        );

        Ok(())
    }

    /// Static service-type mapping with the default fallback account, then a
    /// shape check: the resolved account must be expense-typed.
    async fn resolve_expense_account(
        &self,
        credential: &AccessCredential,
        request: &BillRequest,
    ) -> Result<super::ports::AccountRef> {
        let mapped_id = expense_account_for(request.service_type);

        let account = match self.ledger.get_account(credential, mapped_id).await? {
            Some(account) => account,
            None => self
                .ledger
                .get_account(credential, DEFAULT_EXPENSE_ACCOUNT_ID)
                .await?
                .ok_or_else(|| {
                    SyncError::NotFound(format!(
                        "Expense account {mapped_id} (and fallback {DEFAULT_EXPENSE_ACCOUNT_ID}) \
                         not found in QuickBooks"
                    ))
                })?,
        };

        if !EXPENSE_ACCOUNT_TYPES.contains(&account.account_type.as_str()) {
            return Err(SyncError::Validation(format!(
                "Account {} is not a valid expense account",
                account.name
            )));
        }

        Ok(account)
    }

    async fn default_realm(&self) -> Result<String> {
        self.connections
            .list_realms()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SyncError::Validation("No QuickBooks connection found in the system".into())
            })
    }

    /// The single exit path: write status and detail together, exactly once.
    async fn finalize(
        &self,
        record_id: &str,
        record: &BillingRecord,
        outcome: Result<()>,
    ) -> Result<()> {
        match outcome {
            Ok(()) => {
                self.records.save_status(record_id, BillStatus::BillInQb, "").await?;
                Ok(())
            }
            Err(err) => {
                let detail = StatusDetail::new(
                    record.pdf_link.clone().unwrap_or_default(),
                    issue_headline(&err),
                    err.to_record_detail(),
                );
                if let Err(save_err) = self
                    .records
                    .save_status(record_id, BillStatus::IssueSendingToQb, &detail.to_string())
                    .await
                {
                    // The original error is the one the retry policy needs.
                    warn!(
                        record_id,
                        error = %save_err,
                        "failed to write issue status back onto the record"
                    );
                }
                Err(err)
            }
        }
    }
}

fn issue_headline(err: &SyncError) -> &'static str {
    match err.kind() {
        ErrorKind::NotFound => "Referenced entity not found in QuickBooks",
        ErrorKind::Validation => "Bill failed validation",
        ErrorKind::Transient => "Temporary system issue, will retry",
        ErrorKind::Internal => "Unexpected error",
    }
}
