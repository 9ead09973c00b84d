//! Errors of a dispatch attempt

use pushwire_common::{BrokerError, HttpStatusCode, PushwireError};
use pushwire_db::DbError;
use thiserror::Error;

use crate::payload::PayloadError;

/// Why a dispatch attempt did not reach the audit step.
///
/// A disabled endpoint is not an error: it is reported through
/// [`DispatchOutcome::endpoint_disabled`](crate::handler::DispatchOutcome).
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The device was soft-deleted; nothing is sent to it
    #[error("Device {0} is inactive")]
    DeviceInactive(i64),

    #[error("Device {0} not found")]
    DeviceNotFound(i64),

    #[error("Push message {0} not found")]
    MessageNotFound(i64),

    /// An endpoint cannot be registered without a push token
    #[error("Device {0} has no push token")]
    MissingPushToken(i64),

    #[error("Transport failure: {0}")]
    Transport(#[from] BrokerError),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dispatch queue is closed")]
    QueueClosed,
}

impl DispatchError {
    /// Whether running the same attempt again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Transport(_) => true,
            DispatchError::Storage(err) => {
                !matches!(err, DbError::Conflict(_) | DbError::NotFound(_))
            }
            _ => false,
        }
    }
}

impl HttpStatusCode for DispatchError {
    fn status_code(&self) -> u16 {
        match self {
            DispatchError::Payload(PayloadError::InvalidPayload(_)) => 400,
            DispatchError::Payload(PayloadError::Undecodable(_)) => 500,
            DispatchError::DeviceInactive(_) | DispatchError::MissingPushToken(_) => 409,
            DispatchError::DeviceNotFound(_) | DispatchError::MessageNotFound(_) => 404,
            DispatchError::Transport(_) => 502,
            DispatchError::Storage(_) | DispatchError::Config(_) | DispatchError::QueueClosed => {
                500
            }
        }
    }
}

impl From<DispatchError> for PushwireError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Payload(PayloadError::InvalidPayload(_)) => {
                PushwireError::ValidationError(message)
            }
            DispatchError::Payload(PayloadError::Undecodable(_)) => {
                PushwireError::InternalError(message)
            }
            DispatchError::DeviceInactive(_) | DispatchError::MissingPushToken(_) => {
                PushwireError::ConflictError(message)
            }
            DispatchError::DeviceNotFound(_) | DispatchError::MessageNotFound(_) => {
                PushwireError::NotFoundError(message)
            }
            DispatchError::Transport(_) => pushwire_common::external_service_error("SNS", message),
            DispatchError::Storage(_) => PushwireError::DatabaseError(message),
            DispatchError::Config(_) => PushwireError::ConfigError(message),
            DispatchError::QueueClosed => PushwireError::InternalError(message),
        }
    }
}
