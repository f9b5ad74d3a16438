//! SQLite access for the scoring service
//!
//! Free functions over `&SqlitePool`, one module per table. UUIDs are stored
//! as hyphenated text, timestamps as RFC 3339 text, documents as JSON text.

pub mod idempotency;
pub mod lock_retry;
pub mod recommendations;
pub mod runs;
pub mod schema_configs;
pub mod site_records;
pub mod uploads;

pub use lock_retry::retry_on_lock;

use siteiq_common::{Error, Result};
use uuid::Uuid;

/// Parse a stored UUID column
pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {} '{}': {}", column, value, e)))
}

pub(crate) fn parse_uuid_opt(value: Option<String>, column: &str) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(&v, column)).transpose()
}

/// Parse a stored JSON document column
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(value: &str, column: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}
