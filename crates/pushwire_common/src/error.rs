// --- File: crates/pushwire_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for all pushwire errors.
///
/// Each crate extends this by implementing `From<SpecificError> for PushwireError`.
#[derive(Error, Debug)]
pub enum PushwireError {
    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a conflict (e.g., resource already exists, device inactive)
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for PushwireError {
    fn status_code(&self) -> u16 {
        match self {
            PushwireError::ConfigError(_) => 500,
            PushwireError::ValidationError(_) => 400,
            PushwireError::DatabaseError(_) => 500,
            PushwireError::ExternalServiceError { .. } => 502,
            PushwireError::ConflictError(_) => 409,
            PushwireError::NotFoundError(_) => 404,
            PushwireError::InternalError(_) => 500,
        }
    }
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> PushwireError {
    PushwireError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}
