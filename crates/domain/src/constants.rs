//! Application constants.
//!
//! Centralized location for the static ledger lookup tables and the timing
//! defaults used by the token lifecycle manager and the task runner.

use crate::types::ServiceType;

// Token lifecycle defaults
pub const DEFAULT_REFRESH_SAFETY_WINDOW_SECS: i64 = 300;
pub const DEFAULT_LOCK_TTL_SECS: u64 = 10;
pub const DEFAULT_LOCK_WAIT_SECS: u64 = 5;
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 500;

// Task runner defaults
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 180;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Expense account for a service type.
///
/// Static mapping from the record store's service types onto QuickBooks
/// expense accounts; [`DEFAULT_EXPENSE_ACCOUNT_ID`] backs any future service
/// type that has no entry yet.
#[must_use]
pub fn expense_account_for(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Trash
        | ServiceType::RollOff
        | ServiceType::RollOffMonthly
        | ServiceType::RollOffTemp
        | ServiceType::Compactor
        | ServiceType::Recycling => "1150040001",
        ServiceType::Misc => "14",
    }
}

/// Safety fallback when a mapping is missing or the account is invalid:
/// Trash Removal (Exp.):Trash (Exp.) [COGS].
pub const DEFAULT_EXPENSE_ACCOUNT_ID: &str = "1150040001";

/// Payment term for a hauler's terms-days value.
///
/// Static mapping onto the standard QuickBooks term entries;
/// [`DEFAULT_TERM_ID`] backs unmapped values.
#[must_use]
pub fn term_for_days(terms_days: i64) -> Option<&'static str> {
    match terms_days {
        15 => Some("2"),  // Net 15
        30 => Some("3"),  // Net 30
        60 => Some("4"),  // Net 60
        _ => None,
    }
}

/// Safety fallback payment term: Due on receipt.
pub const DEFAULT_TERM_ID: &str = "1";
