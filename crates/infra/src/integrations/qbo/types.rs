//! Wire types for the QuickBooks Online v3 API.
//!
//! Field names follow the QBO JSON casing exactly; everything the service
//! does not read is left out and ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Envelope around `GET /v3/company/{realm}/query` responses.
#[derive(Debug, Deserialize)]
pub struct QueryEnvelope {
    #[serde(rename = "QueryResponse", default)]
    pub query_response: QueryResponse,
}

/// One entity list per queryable type; QBO fills only the queried one.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "Vendor", default)]
    pub vendors: Vec<QboVendor>,
    #[serde(rename = "Customer", default)]
    pub customers: Vec<QboCustomer>,
    #[serde(rename = "Account", default)]
    pub accounts: Vec<QboAccount>,
    #[serde(rename = "Department", default)]
    pub departments: Vec<QboDepartment>,
    #[serde(rename = "Bill", default)]
    pub bills: Vec<QboBill>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QboVendor {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QboCustomer {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
    #[serde(rename = "BillAddr")]
    pub bill_addr: Option<QboAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QboAddress {
    #[serde(rename = "Line1")]
    pub line1: Option<String>,
    #[serde(rename = "City")]
    pub city: Option<String>,
    #[serde(rename = "CountrySubDivisionCode")]
    pub region: Option<String>,
    #[serde(rename = "PostalCode")]
    pub postal_code: Option<String>,
}

impl QboAddress {
    /// Single-line rendering used as the expense line description.
    #[must_use]
    pub fn render(&self) -> String {
        [&self.line1, &self.city, &self.region, &self.postal_code]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QboAccount {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "AccountType", default)]
    pub account_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QboDepartment {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QboBill {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "DocNumber", default)]
    pub doc_number: String,
}

/// Envelope around a successful bill create.
#[derive(Debug, Deserialize)]
pub struct BillEnvelope {
    #[serde(rename = "Bill")]
    pub bill: QboBill,
}

/// Entity reference (`{"value": id, "name": ...}`).
#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityRef {
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self { value: value.into(), name: None }
    }

    #[must_use]
    pub fn named(value: impl Into<String>, name: impl Into<String>) -> Self {
        Self { value: value.into(), name: Some(name.into()) }
    }
}

/// Request body for `POST /v3/company/{realm}/bill`.
#[derive(Debug, Serialize)]
pub struct BillPayload {
    #[serde(rename = "DocNumber")]
    pub doc_number: String,
    #[serde(rename = "VendorRef")]
    pub vendor_ref: EntityRef,
    #[serde(rename = "TxnDate")]
    pub txn_date: String,
    #[serde(rename = "DueDate")]
    pub due_date: String,
    #[serde(rename = "PrivateNote")]
    pub private_note: String,
    #[serde(rename = "DepartmentRef", skip_serializing_if = "Option::is_none")]
    pub department_ref: Option<EntityRef>,
    #[serde(rename = "SalesTermRef")]
    pub sales_term_ref: EntityRef,
    #[serde(rename = "Line")]
    pub line: Vec<BillLinePayload>,
}

/// One account-based expense line.
#[derive(Debug, Serialize)]
pub struct BillLinePayload {
    #[serde(rename = "DetailType")]
    pub detail_type: &'static str,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "AccountBasedExpenseLineDetail")]
    pub detail: ExpenseLineDetail,
}

#[derive(Debug, Serialize)]
pub struct ExpenseLineDetail {
    #[serde(rename = "AccountRef")]
    pub account_ref: EntityRef,
    #[serde(rename = "CustomerRef")]
    pub customer_ref: EntityRef,
}
