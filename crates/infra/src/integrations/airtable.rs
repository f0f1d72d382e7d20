//! Airtable record store client.
//!
//! Implements the core `RecordStore` port against the Airtable REST API.
//! The Bills table links out to Haulers, Customers, and Services; the
//! fields this pipeline maps (hauler number, customer account, service
//! type) live on those linked records, so a fetch resolves the first link
//! of each before assembling the [`BillingRecord`]. Field names are the
//! literal Airtable column names, magnifier emoji included.

use async_trait::async_trait;
use billbridge_core::sync::RecordStore;
use billbridge_domain::{BillStatus, BillingRecord, RecordStoreConfig, Result, SyncError};
use reqwest::{header, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::errors::InfraError;
use crate::http::HttpClient;

const API_BASE_URL: &str = "https://api.airtable.com/v0";
const BILLS_TABLE: &str = "Bills";
const HAULERS_TABLE: &str = "Haulers";
const CUSTOMERS_TABLE: &str = "Customers";
const SERVICES_TABLE: &str = "Services";

/// Airtable REST client implementing the record-store port.
pub struct AirtableRecordStore {
    http: HttpClient,
    base_url: String,
    token: String,
    base_id: String,
}

/// Raw Airtable record: id plus a free-form field map.
#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl AirtableRecordStore {
    /// Create a client from record-store settings.
    #[must_use]
    pub fn new(http: HttpClient, config: &RecordStoreConfig) -> Self {
        Self {
            http,
            base_url: API_BASE_URL.to_string(),
            token: config.token.clone(),
            base_id: config.base_id.clone(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_record(&self, table: &str, record_id: &str) -> Result<AirtableRecord> {
        let url = format!("{}/{}/{}/{}", self.base_url, self.base_id, table, record_id);
        debug!(table, record_id, "fetching record");

        let request = self
            .http
            .request(Method::GET, &url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json");

        let response = self.http.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(format!(
                "{} record {record_id} not found in the record store",
                table.trim_end_matches('s')
            )));
        }
        let response = classify_response(response).await?;
        let record: AirtableRecord = response.json().await.map_err(InfraError::from)?;
        Ok(record)
    }

    /// Resolve the first linked record of a link field, if any.
    async fn linked_record(
        &self,
        fields: &Map<String, Value>,
        field: &str,
        table: &str,
    ) -> Result<Option<AirtableRecord>> {
        match first_string(fields, field) {
            Some(linked_id) => Ok(Some(self.get_record(table, &linked_id).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordStore for AirtableRecordStore {
    async fn fetch_billing_record(&self, record_id: &str) -> Result<BillingRecord> {
        let bill = match self.get_record(BILLS_TABLE, record_id).await {
            Ok(bill) => bill,
            Err(SyncError::NotFound(_)) => {
                return Err(SyncError::NotFound(format!("Bill with id {record_id} not found")))
            }
            Err(other) => return Err(other),
        };
        let fields = &bill.fields;

        let hauler = self.linked_record(fields, "Hauler 🔎", HAULERS_TABLE).await?;
        let customer = self.linked_record(fields, "Customer 🔎", CUSTOMERS_TABLE).await?;
        let service = self.linked_record(fields, "Service 🔎", SERVICES_TABLE).await?;

        Ok(BillingRecord {
            id: bill.id,
            bill_number: string_field(fields, "Bill #"),
            status: string_field(fields, "Status"),
            status_detail: string_field(fields, "Status detail"),
            pdf_link: string_field(fields, "PDF Link"),
            bill_date: string_field(fields, "Bill date"),
            due: string_field(fields, "Due"),
            bill_amount: number_field(fields, "Bill amount"),
            hauler_number: hauler
                .as_ref()
                .and_then(|record| string_field(&record.fields, "H#")),
            customer_account: customer
                .as_ref()
                .and_then(|record| string_field(&record.fields, "A#")),
            service_type: service
                .as_ref()
                .and_then(|record| first_string(&record.fields, "Type")),
            service_account: first_string(fields, "Service Account 🔎"),
            terms_days: hauler
                .as_ref()
                .and_then(|record| number_field(&record.fields, "Terms (days)"))
                .map(|days| days as i64),
        })
    }

    async fn save_status(&self, record_id: &str, status: BillStatus, detail: &str) -> Result<()> {
        let url = format!("{}/{}/{}/{}", self.base_url, self.base_id, BILLS_TABLE, record_id);
        let body = json!({
            "fields": {
                "Status": status.as_str(),
                "Status detail": detail,
            }
        });

        let request = self
            .http
            .request(Method::PATCH, &url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json")
            .json(&body);

        let response = self.http.send(request).await?;
        classify_response(response).await?;
        debug!(record_id, status = %status, "status written back to record");
        Ok(())
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

fn number_field(fields: &Map<String, Value>, name: &str) -> Option<f64> {
    fields.get(name).and_then(Value::as_f64)
}

/// First string of an array field (links and lookups are arrays), or the
/// bare string when Airtable flattens single values.
fn first_string(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        Value::String(value) => Some(value.clone()),
        _ => None,
    }
}

async fn classify_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(SyncError::Transient(format!("record store returned {status}: {body}")))
    } else {
        Err(SyncError::Validation(format!(
            "record store rejected the request ({status}): {body}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn store(server: &MockServer) -> AirtableRecordStore {
        let http = HttpClient::builder()
            .base_backoff(std::time::Duration::from_millis(5))
            .build()
            .expect("http client");
        let config = RecordStoreConfig { token: "pat-123".into(), base_id: "appBASE".into() };
        AirtableRecordStore::new(http, &config).with_base_url(server.uri())
    }

    async fn mount_record(server: &MockServer, table: &str, id: &str, fields: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/appBASE/{table}/{id}")))
            .and(header("authorization", "Bearer pat-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "createdTime": "2025-03-01T10:00:00.000Z",
                "fields": fields,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_assembles_record_from_linked_tables() {
        let server = MockServer::start().await;
        mount_record(
            &server,
            "Bills",
            "rec0012345",
            json!({
                "Bill #": "0320-004595675",
                "Status": "Send bill to QB",
                "PDF Link": "https://files.example.com/bill.pdf",
                "Bill date": "2025-03-01",
                "Due": "03/15/2025",
                "Bill amount": 412.5,
                "Hauler 🔎": ["recHAULER1"],
                "Customer 🔎": ["recCUST1"],
                "Service 🔎": ["recSVC1"],
                "Service Account 🔎": ["SA-7"],
            }),
        )
        .await;
        mount_record(&server, "Haulers", "recHAULER1", json!({"H#": "H-42", "Terms (days)": 30}))
            .await;
        mount_record(&server, "Customers", "recCUST1", json!({"A#": "Acme Corp - A-1042"})).await;
        mount_record(&server, "Services", "recSVC1", json!({"Type": ["Trash"]})).await;

        let record = store(&server).fetch_billing_record("rec0012345").await.expect("fetched");

        assert_eq!(record.bill_number.as_deref(), Some("0320-004595675"));
        assert_eq!(record.hauler_number.as_deref(), Some("H-42"));
        assert_eq!(record.customer_account.as_deref(), Some("Acme Corp - A-1042"));
        assert_eq!(record.service_type.as_deref(), Some("Trash"));
        assert_eq!(record.service_account.as_deref(), Some("SA-7"));
        assert_eq!(record.terms_days, Some(30));
        assert_eq!(record.bill_amount, Some(412.5));
    }

    #[tokio::test]
    async fn fetch_tolerates_missing_links() {
        let server = MockServer::start().await;
        mount_record(
            &server,
            "Bills",
            "rec0012345",
            json!({
                "Bill #": "0320-004595675",
                "Status": "Send bill to QB",
            }),
        )
        .await;

        let record = store(&server).fetch_billing_record("rec0012345").await.expect("fetched");

        assert!(record.hauler_number.is_none());
        assert!(record.customer_account.is_none());
        assert!(record.service_type.is_none());
    }

    #[tokio::test]
    async fn missing_bill_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"type": "MODEL_ID_NOT_FOUND"}
            })))
            .mount(&server)
            .await;

        let err = store(&server).fetch_billing_record("recMISSING").await.unwrap_err();

        assert!(matches!(err, SyncError::NotFound(_)));
        assert!(err.to_string().contains("recMISSING"));
    }

    #[tokio::test]
    async fn save_status_patches_both_fields_together() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/appBASE/Bills/rec0012345"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "rec0012345", "fields": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .save_status("rec0012345", BillStatus::IssueSendingToQb, "404: vendor missing")
            .await
            .expect("patched");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["fields"]["Status"], "Issue sending to QB");
        assert_eq!(body["fields"]["Status detail"], "404: vendor missing");
    }

    #[tokio::test]
    async fn record_store_outage_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = store(&server)
            .save_status("rec0012345", BillStatus::BillInQb, "")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transient(_)));
    }
}
