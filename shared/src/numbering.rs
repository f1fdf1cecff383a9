//! Human-facing document identifiers
//!
//! Bill numbers and order ids are `<prefix><YY><MM><seq:04>`. The sequence is
//! allocated per prefix and month by the store.

use chrono::{DateTime, Datelike, Utc};

pub const TECHNICIAN_BILL_PREFIX: &str = "TB";
pub const WORK_ORDER_PREFIX: &str = "WO";

/// Counter key for a prefix in the month of `at`, e.g. `CB2510`
pub fn sequence_key(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}{:02}{:02}", prefix, at.year() % 100, at.month())
}

pub fn document_number(prefix: &str, at: DateTime<Utc>, sequence: i64) -> String {
    format!("{}{:04}", sequence_key(prefix, at), sequence)
}

/// `PRJ-` followed by the last six digits of the epoch milliseconds
pub fn project_id(at: DateTime<Utc>) -> String {
    format!("PRJ-{:06}", at.timestamp_millis().rem_euclid(1_000_000))
}
