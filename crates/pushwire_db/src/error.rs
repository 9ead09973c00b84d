//! Error types for the database client

use pushwire_common::PushwireError;
use thiserror::Error;

/// Errors that can occur when working with the device and message stores
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query
    #[error("Database query error: {0}")]
    QueryError(String),

    /// A stored row could not be mapped back into a record
    #[error("Database decode error: {0}")]
    DecodeError(String),

    /// The addressed record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated
    #[error("Conflicting record: {0}")]
    Conflict(String),
}

impl DbError {
    /// Maps a failed statement, keeping unique-constraint violations apart from other failures.
    pub(crate) fn from_query(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(db_err.message().to_string())
            }
            _ => DbError::QueryError(err.to_string()),
        }
    }
}

impl From<DbError> for PushwireError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => PushwireError::NotFoundError(what),
            DbError::Conflict(what) => PushwireError::ConflictError(what),
            DbError::ConfigError(msg) | DbError::UrlError(msg) => PushwireError::ConfigError(msg),
            other => PushwireError::DatabaseError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushwire_common::HttpStatusCode;

    #[test]
    fn test_db_errors_map_to_http_status() {
        assert_eq!(
            PushwireError::from(DbError::NotFound("device 3".into())).status_code(),
            404
        );
        assert_eq!(
            PushwireError::from(DbError::Conflict("token".into())).status_code(),
            409
        );
        assert_eq!(
            PushwireError::from(DbError::QueryError("boom".into())).status_code(),
            500
        );
    }
}
