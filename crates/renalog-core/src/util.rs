//! Shared helpers for timestamps and civil dates.
//!
//! Timestamps are stored as RFC 3339 TEXT in UTC, dates as `YYYY-MM-DD`.
//! Both sort correctly as strings, which the recency indexes rely on.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};

use crate::error::{Error, Result};

/// Current UTC timestamp, truncated to the microsecond precision storage uses.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Render a timestamp for storage (RFC 3339, microsecond precision, UTC).
pub fn timestamp_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, failing fast on malformed rows.
pub fn timestamp_from_sql(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|error| Error::MalformedRow(format!("bad timestamp '{raw}': {error}")))
}

/// Render a civil date for storage (`YYYY-MM-DD`).
pub fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a stored civil date, failing fast on malformed rows.
pub fn date_from_sql(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| Error::MalformedRow(format!("bad date '{raw}': {error}")))
}

/// Normalize optional text by trimming whitespace and removing empties.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
