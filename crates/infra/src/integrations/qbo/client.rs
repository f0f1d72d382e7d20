//! QuickBooks Online ledger API client.
//!
//! Implements the core `LedgerApi` port over the QBO v3 REST API. Entity
//! resolution goes through the query endpoint; zero-result queries return
//! `None` and the engine decides what that means. HTTP failures are
//! classified here: 429, 5xx, and transport timeouts are transient,
//! anything else is a validation-class rejection carrying the response
//! payload.

use async_trait::async_trait;
use billbridge_core::sync::ports::{
    AccountRef, BillRef, CustomerRef, DepartmentRef, LedgerApi, LedgerBill, VendorRef,
};
use billbridge_domain::{AccessCredential, Environment, Result, SyncError};
use reqwest::{header, Method, Response, StatusCode};
use tracing::debug;

use super::types::{
    BillEnvelope, BillLinePayload, BillPayload, EntityRef, ExpenseLineDetail, QueryEnvelope,
    QueryResponse,
};
use crate::errors::InfraError;
use crate::http::HttpClient;

const SANDBOX_BASE_URL: &str = "https://sandbox-quickbooks.api.intuit.com";
const PRODUCTION_BASE_URL: &str = "https://quickbooks.api.intuit.com";
const MINOR_VERSION: &str = "65";

/// QBO v3 REST client implementing the ledger port.
pub struct QboApiClient {
    http: HttpClient,
    base_url: String,
}

impl QboApiClient {
    /// Create a client for the given environment.
    #[must_use]
    pub fn new(http: HttpClient, environment: Environment) -> Self {
        let base_url = match environment {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        };
        Self { http, base_url: base_url.to_string() }
    }

    #[cfg(test)]
    fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    async fn query(&self, credential: &AccessCredential, query: &str) -> Result<QueryResponse> {
        let url = format!("{}/v3/company/{}/query", self.base_url, credential.realm_id);
        debug!(realm_id = %credential.realm_id, query, "ledger query");

        let request = self
            .http
            .request(Method::GET, &url)
            .bearer_auth(&credential.access_token)
            .header(header::ACCEPT, "application/json")
            .query(&[("query", query), ("minorversion", MINOR_VERSION)]);

        let response = self.http.send(request).await?;
        let response = classify_response(response).await?;
        let envelope: QueryEnvelope = response.json().await.map_err(InfraError::from)?;
        Ok(envelope.query_response)
    }
}

#[async_trait]
impl LedgerApi for QboApiClient {
    async fn find_vendor(
        &self,
        credential: &AccessCredential,
        hauler_number: &str,
    ) -> Result<Option<VendorRef>> {
        let query =
            format!("SELECT * FROM Vendor WHERE Id = '{}'", escape_query_value(hauler_number));
        let vendors = self.query(credential, &query).await?.vendors;
        Ok(vendors
            .into_iter()
            .next()
            .map(|v| VendorRef { id: v.id, display_name: v.display_name }))
    }

    async fn find_customer_by_display_name(
        &self,
        credential: &AccessCredential,
        fragment: &str,
    ) -> Result<Option<CustomerRef>> {
        let query = format!(
            "SELECT * FROM Customer WHERE DisplayName LIKE '%{}%'",
            escape_query_value(fragment)
        );
        let customers = self.query(credential, &query).await?.customers;
        Ok(customers.into_iter().next().map(|c| CustomerRef {
            id: c.id,
            display_name: c.display_name,
            bill_addr: c.bill_addr.map(|addr| addr.render()),
        }))
    }

    async fn get_account(
        &self,
        credential: &AccessCredential,
        account_id: &str,
    ) -> Result<Option<AccountRef>> {
        let query =
            format!("SELECT * FROM Account WHERE Id = '{}'", escape_query_value(account_id));
        let accounts = self.query(credential, &query).await?.accounts;
        Ok(accounts.into_iter().next().map(|a| AccountRef {
            id: a.id,
            name: a.name,
            account_type: a.account_type,
        }))
    }

    async fn find_department_by_name(
        &self,
        credential: &AccessCredential,
        fragment: &str,
    ) -> Result<Option<DepartmentRef>> {
        let query = format!(
            "SELECT * FROM Department WHERE Name LIKE '%{}%'",
            escape_query_value(fragment)
        );
        let departments = self.query(credential, &query).await?.departments;
        Ok(departments
            .into_iter()
            .next()
            .map(|d| DepartmentRef { id: d.id, name: d.name }))
    }

    async fn find_bill_by_doc_number(
        &self,
        credential: &AccessCredential,
        doc_number: &str,
    ) -> Result<Option<BillRef>> {
        let query =
            format!("SELECT * FROM Bill WHERE DocNumber = '{}'", escape_query_value(doc_number));
        let bills = self.query(credential, &query).await?.bills;
        Ok(bills.into_iter().next().map(|b| BillRef { id: b.id, doc_number: b.doc_number }))
    }

    async fn create_bill(
        &self,
        credential: &AccessCredential,
        bill: &LedgerBill,
    ) -> Result<BillRef> {
        let url = format!("{}/v3/company/{}/bill", self.base_url, credential.realm_id);
        let payload = to_payload(bill);

        let request = self
            .http
            .request(Method::POST, &url)
            .bearer_auth(&credential.access_token)
            .header(header::ACCEPT, "application/json")
            .query(&[("minorversion", MINOR_VERSION)])
            .json(&payload);

        // Creation is not idempotent at the transport level; replays are
        // handled by the document-number check, not blind retries.
        let response = self.http.send_once(request).await?;
        let response = classify_response(response).await?;
        let envelope: BillEnvelope = response.json().await.map_err(InfraError::from)?;
        Ok(BillRef { id: envelope.bill.id, doc_number: envelope.bill.doc_number })
    }
}

fn to_payload(bill: &LedgerBill) -> BillPayload {
    BillPayload {
        doc_number: bill.doc_number.clone(),
        vendor_ref: EntityRef::id(&bill.vendor_id),
        txn_date: bill.txn_date.format("%Y-%m-%d").to_string(),
        due_date: bill.due_date.format("%Y-%m-%d").to_string(),
        private_note: bill.private_note.clone(),
        department_ref: bill.department_id.as_deref().map(EntityRef::id),
        sales_term_ref: EntityRef::id(&bill.term_id),
        line: vec![BillLinePayload {
            detail_type: "AccountBasedExpenseLineDetail",
            amount: bill.line.amount,
            description: bill.line.description.clone(),
            detail: ExpenseLineDetail {
                account_ref: EntityRef::named(
                    &bill.line.expense_account_id,
                    &bill.line.expense_account_name,
                ),
                customer_ref: EntityRef::named(&bill.line.customer_id, &bill.line.customer_name),
            },
        }],
    }
}

/// QBO query syntax escapes single quotes by doubling them.
fn escape_query_value(value: &str) -> String {
    value.replace('\'', "''")
}

/// Map a non-success response onto the error taxonomy, keeping the payload.
async fn classify_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(SyncError::Transient(format!("ledger API returned {status}: {body}")))
    } else {
        Err(SyncError::Validation(format!("ledger API rejected the request ({status}): {body}")))
    }
}
