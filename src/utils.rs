//! Utility functions for dates and log formatting.
//!
//! This module provides helper functions used throughout the application:
//! - Parsing and rendering the compact `YYYYMMDD` dates the API speaks
//! - Truncating upstream response bodies before they reach the log

use chrono::{Local, NaiveDate};

use crate::error::ConfigError;

const COMPACT_DATE: &str = "%Y%m%d";

/// Parse a compact `YYYYMMDD` date.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDate`] if the string is not exactly eight
/// digits naming a real calendar date.
///
/// # Examples
///
/// ```ignore
/// assert!(parse_compact_date("20240229").is_ok());
/// assert!(parse_compact_date("2024-02-29").is_err());
/// ```
pub fn parse_compact_date(s: &str) -> Result<NaiveDate, ConfigError> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, COMPACT_DATE).map_err(|_| ConfigError::InvalidDate(s.to_string()))
}

/// Render a date as `YYYYMMDD`.
pub fn format_compact_date(date: NaiveDate) -> String {
    date.format(COMPACT_DATE).to_string()
}

/// Today's date in the local timezone.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (backing off to a char
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}
