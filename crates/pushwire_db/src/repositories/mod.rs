//! Repository implementations
//!
//! SQL stores over the `Any` driver, plus in-memory stores with the same constraints.

pub mod device_sql;
pub mod factory;
pub mod memory;
pub mod push_message_sql;

pub use device_sql::SqlDeviceRepository;
pub use factory::SqlRepositoryFactory;
pub use memory::{MemoryDeviceRepository, MemoryPushMessageRepository};
pub use push_message_sql::SqlPushMessageRepository;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::AnyRow;
use sqlx::{Row, ValueRef};

use crate::error::DbError;

// The Any driver has no DateTime codec; timestamps are stored as fixed-width RFC 3339 text,
// which keeps lexical and chronological order identical.
pub(crate) fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::DecodeError(format!("invalid timestamp {:?}: {}", raw, e)))
}

// Any rows only decode NULL through the raw value; a typed Option<String> read fails on NULL.
pub(crate) fn try_get_nullable(row: &AnyRow, column: &str) -> Result<Option<String>, DbError> {
    if row.try_get_raw(column)?.is_null() {
        return Ok(None);
    }
    Ok(Some(row.try_get(column)?))
}

/// Table names come from configuration and are interpolated into SQL, so only plain
/// identifiers are accepted.
pub fn validate_table_name(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DbError::ConfigError(format!(
            "invalid table name: {:?}",
            name
        )))
    }
}
