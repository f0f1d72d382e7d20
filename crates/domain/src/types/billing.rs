//! Billing record types and the validated bill request.
//!
//! [`BillingRecord`] mirrors the subset of record-store fields this service
//! reads and writes. Field values arrive as loosely-typed strings from the
//! record store; [`BillRequest::from_record`] is the single place they are
//! validated and narrowed before any external call is made.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SyncError};

/// Workflow status of a billing record in the record store.
///
/// The string values are the literal select-field options used by the
/// record store, so serialization must round-trip them exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    #[serde(rename = "Done")]
    Done,
    #[serde(rename = "Leave")]
    Leave,
    #[serde(rename = "Send bill to QB")]
    SendBillToQb,
    #[serde(rename = "Issue sending to QB")]
    IssueSendingToQb,
    #[serde(rename = "Bill in QB")]
    BillInQb,
    #[serde(rename = "Send invoice to SF")]
    SendInvoiceToSf,
    #[serde(rename = "Issue sending to SF")]
    IssueSendingToSf,
    #[serde(rename = "Invoice in SF")]
    InvoiceInSf,
}

impl BillStatus {
    /// Literal select-field option as stored in the record store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "Done",
            Self::Leave => "Leave",
            Self::SendBillToQb => "Send bill to QB",
            Self::IssueSendingToQb => "Issue sending to QB",
            Self::BillInQb => "Bill in QB",
            Self::SendInvoiceToSf => "Send invoice to SF",
            Self::IssueSendingToSf => "Issue sending to SF",
            Self::InvoiceInSf => "Invoice in SF",
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service type linked to a billing record; determines the expense account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "Trash")]
    Trash,
    #[serde(rename = "Roll off (move to tempo or monthly)")]
    RollOff,
    #[serde(rename = "Roll off - Monthly")]
    RollOffMonthly,
    #[serde(rename = "Roll off - Temp")]
    RollOffTemp,
    #[serde(rename = "Compactor")]
    Compactor,
    #[serde(rename = "Recycling")]
    Recycling,
    #[serde(rename = "Misc")]
    Misc,
}

impl ServiceType {
    /// Parse the record store's select-field value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Trash" => Some(Self::Trash),
            "Roll off (move to tempo or monthly)" => Some(Self::RollOff),
            "Roll off - Monthly" => Some(Self::RollOffMonthly),
            "Roll off - Temp" => Some(Self::RollOffTemp),
            "Compactor" => Some(Self::Compactor),
            "Recycling" => Some(Self::Recycling),
            "Misc" => Some(Self::Misc),
            _ => None,
        }
    }
}

/// Subset of record-store fields read and written by the sync pipeline.
///
/// Optional fields are links or lookups the record may not carry; the
/// mapping step decides which of them are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Record-store identifier.
    pub id: String,
    pub bill_number: Option<String>,
    pub status: Option<String>,
    pub status_detail: Option<String>,
    /// Link to the dropped bill document.
    pub pdf_link: Option<String>,
    /// Bill date as an ISO date string.
    pub bill_date: Option<String>,
    /// Due date in the source's month/day/year format.
    pub due: Option<String>,
    pub bill_amount: Option<f64>,
    /// Vendor-reference key of the linked hauler.
    pub hauler_number: Option<String>,
    /// Customer account name, possibly prefixed ("Acme Corp - A-1042").
    pub customer_account: Option<String>,
    /// Select-field value of the linked service's type.
    pub service_type: Option<String>,
    /// Service account key used for department resolution.
    pub service_account: Option<String>,
    /// Payment terms in days from the linked hauler.
    pub terms_days: Option<i64>,
}

/// Validated bill data, ready to be turned into a ledger transaction.
///
/// Construction is the fail-fast validation gate: any missing or malformed
/// required field raises [`SyncError::Validation`] before any external call
/// is made.
#[derive(Debug, Clone, PartialEq)]
pub struct BillRequest {
    pub bill_number: String,
    pub status: BillStatus,
    pub pdf_link: String,
    pub bill_date: NaiveDate,
    pub due: NaiveDate,
    pub hauler_number: String,
    pub customer_account: String,
    pub service_type: ServiceType,
    pub service_account: String,
    pub total_amount: f64,
    pub terms_days: i64,
}

impl BillRequest {
    /// Map and validate a raw billing record.
    pub fn from_record(record: &BillingRecord) -> Result<Self> {
        let bill_number = require_str(&record.bill_number, "bill number")?;
        let status_raw = require_str(&record.status, "status")?;
        let status: BillStatus = serde_json::from_value(serde_json::Value::String(status_raw))
            .map_err(|_| {
                SyncError::Validation(format!(
                    "Bill has an unknown status value: {:?}",
                    record.status
                ))
            })?;
        let pdf_link = require_str(&record.pdf_link, "document link")?;

        let bill_date_raw = require_str(&record.bill_date, "bill date")?;
        let bill_date = NaiveDate::parse_from_str(&bill_date_raw, "%Y-%m-%d").map_err(|_| {
            SyncError::Validation(format!("Invalid bill date: {bill_date_raw:?}"))
        })?;

        let due_raw = require_str(&record.due, "due date")?;
        let due = parse_due_date(&due_raw)?;

        let hauler_number = record
            .hauler_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SyncError::Validation("Bill does not have a Hauler associated".into()))?;

        let customer_account = record
            .customer_account
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                SyncError::Validation("Bill does not have a Customer associated".into())
            })?;

        let service_type_raw = require_str(&record.service_type, "service type")?;
        let service_type = ServiceType::parse(&service_type_raw).ok_or_else(|| {
            SyncError::Validation(format!("Unknown service type: {service_type_raw:?}"))
        })?;

        let service_account = require_str(&record.service_account, "service account")?;

        let total_amount = record
            .bill_amount
            .ok_or_else(|| SyncError::Validation("Bill is missing the amount".into()))?;
        if !total_amount.is_finite() || total_amount <= 0.0 {
            return Err(SyncError::Validation(format!(
                "Bill amount must be positive, got {total_amount}"
            )));
        }

        let terms_days = record.terms_days.unwrap_or(0);

        Ok(Self {
            bill_number,
            status,
            pdf_link,
            bill_date,
            due,
            hauler_number,
            customer_account,
            service_type,
            service_account,
            total_amount,
            terms_days,
        })
    }

    /// The customer display-name fragment used to query the ledger: the
    /// portion after the last `" - "` separator, tolerating prefixed names.
    #[must_use]
    pub fn customer_search_fragment(&self) -> &str {
        self.customer_account.rsplit(" - ").next().unwrap_or(&self.customer_account)
    }
}

/// Parse the source's month/day/year due-date format.
///
/// The value must be explicitly valid: `"03/15/2025"` is March 15th, and a
/// value like `"15/03/2025"` is rejected rather than silently reinterpreted.
pub fn parse_due_date(value: &str) -> Result<NaiveDate> {
    let mut parts = value.split('/');
    let (m, d, y) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(d), Some(y), None) => (m, d, y),
        _ => return Err(SyncError::Validation(format!("Invalid due date format: {value:?}"))),
    };

    let month: u32 = m
        .trim()
        .parse()
        .map_err(|_| SyncError::Validation(format!("Invalid due date format: {value:?}")))?;
    let day: u32 = d
        .trim()
        .parse()
        .map_err(|_| SyncError::Validation(format!("Invalid due date format: {value:?}")))?;
    let year: i32 = y
        .trim()
        .parse()
        .map_err(|_| SyncError::Validation(format!("Invalid due date format: {value:?}")))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| SyncError::Validation(format!("Invalid due date: {value:?}")))
}

fn require_str(field: &Option<String>, name: &str) -> Result<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SyncError::Validation(format!("Bill is missing the {name}")))
}

#[cfg(test)]
mod tests {
    //! Unit tests for billing types and mapping validation.
    use super::*;

    fn complete_record() -> BillingRecord {
        BillingRecord {
            id: "rec0012345".into(),
            bill_number: Some("0320-004595675".into()),
            status: Some("Send bill to QB".into()),
            status_detail: None,
            pdf_link: Some("https://files.example.com/bill.pdf".into()),
            bill_date: Some("2025-03-01".into()),
            due: Some("03/15/2025".into()),
            bill_amount: Some(412.50),
            hauler_number: Some("H-42".into()),
            customer_account: Some("Acme Corp - A-1042".into()),
            service_type: Some("Trash".into()),
            service_account: Some("SA-7".into()),
            terms_days: Some(30),
        }
    }

    /// Validates `BillRequest::from_record` behavior for a complete record.
    ///
    /// Assertions:
    /// - Confirms dates, amount, and keys survive the mapping.
    #[test]
    fn maps_complete_record() {
        let request = BillRequest::from_record(&complete_record()).unwrap();

        assert_eq!(request.bill_number, "0320-004595675");
        assert_eq!(request.status, BillStatus::SendBillToQb);
        assert_eq!(request.due, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(request.bill_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(request.service_type, ServiceType::Trash);
        assert!((request.total_amount - 412.50).abs() < f64::EPSILON);
    }

    /// Scenario: billing record with no associated hauler.
    ///
    /// Assertions:
    /// - Ensures the mapping fails with a `Validation` error mentioning the
    ///   hauler before any external call could be made.
    #[test]
    fn missing_hauler_is_validation_error() {
        let record = BillingRecord { hauler_number: None, ..complete_record() };

        let err = BillRequest::from_record(&record).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(err.to_string().contains("Hauler"));
    }

    /// Validates `BillRequest::from_record` behavior for a non-positive
    /// amount.
    ///
    /// Assertions:
    /// - Ensures zero amounts are rejected as `Validation`.
    #[test]
    fn zero_amount_is_rejected() {
        let record = BillingRecord { bill_amount: Some(0.0), ..complete_record() };
        assert!(matches!(BillRequest::from_record(&record), Err(SyncError::Validation(_))));
    }

    /// Validates `parse_due_date` behavior for the month/day/year format.
    ///
    /// Assertions:
    /// - Confirms `"03/15/2025"` parses as 2025-03-15.
    /// - Ensures `"15/03/2025"` (month 15) is rejected, not reinterpreted.
    /// - Ensures junk input is rejected.
    #[test]
    fn due_date_is_month_day_year() {
        assert_eq!(
            parse_due_date("03/15/2025").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
        assert!(parse_due_date("15/03/2025").is_err());
        assert!(parse_due_date("2025-03-15").is_err());
        assert!(parse_due_date("soon").is_err());
    }

    /// Validates `BillRequest::customer_search_fragment` behavior for
    /// prefixed display names.
    ///
    /// Assertions:
    /// - Confirms the fragment after the last `" - "` is used.
    /// - Confirms un-prefixed names pass through unchanged.
    #[test]
    fn customer_fragment_strips_prefix() {
        let request = BillRequest::from_record(&complete_record()).unwrap();
        assert_eq!(request.customer_search_fragment(), "A-1042");

        let record =
            BillingRecord { customer_account: Some("A-2000".into()), ..complete_record() };
        let request = BillRequest::from_record(&record).unwrap();
        assert_eq!(request.customer_search_fragment(), "A-2000");
    }

    /// Validates `BillStatus` serde round-trip of record-store values.
    ///
    /// Assertions:
    /// - Confirms the literal select-field strings round-trip exactly.
    #[test]
    fn status_round_trips_select_values() {
        let json = serde_json::to_string(&BillStatus::IssueSendingToQb).unwrap();
        assert_eq!(json, "\"Issue sending to QB\"");
        let back: BillStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BillStatus::IssueSendingToQb);
    }
}
