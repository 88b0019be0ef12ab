// src/utils/time.rs

//! Date helpers shared by the client, the store, and the sync pipeline.
//!
//! Every date written to a partition index goes through [`canonical_date`],
//! so lexicographic comparison of stored strings is equivalent to
//! chronological comparison. Keep that the single serialization point.

use chrono::{Datelike, NaiveDate};

/// Canonical fixed-precision date format used in partition indexes.
pub fn canonical_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a date leniently: a plain ISO date, or the date part of an
/// RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    // "2024-01-02T03:04:05Z" and friends: the first ten chars carry the date.
    trimmed
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Partition key for the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

/// Month keys for every partition overlapping `[start, end]`, ascending.
pub fn months_covering(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push(format!("{year:04}{month:02}"));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}
