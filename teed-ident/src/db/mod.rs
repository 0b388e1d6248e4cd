//! Database access for teed-ident
//!
//! Schema creation lives in `teed_common::db`; these modules read and write
//! the service's rows.

pub mod corrections;
pub mod library;
pub mod settings;
pub mod telemetry;

use chrono::{DateTime, Utc};
use teed_common::{Error, Result};

/// Parse an RFC 3339 column
pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Decode a JSON text column
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(column: &str, value: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}

/// Encode a value for a JSON text column
pub(crate) fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", column, e)))
}

pub(crate) fn parse_uuid(value: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid id '{}': {}", value, e)))
}
