//! Timestamp utilities
//!
//! Timestamps are persisted as RFC 3339 text in UTC with fixed millisecond
//! precision, so lexical order in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Parse an optional stored timestamp
pub fn from_db_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db).transpose()
}
