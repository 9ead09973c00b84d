// --- File: crates/pushwire_common/src/services.rs ---
//! Service abstractions for the push broker.
//!
//! The dispatcher talks to the broker only through [`PushBroker`], so the SNS client can be
//! swapped for a recording mock in tests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Broker error code reported when an endpoint was disabled (app uninstalled, token revoked).
pub const ENDPOINT_DISABLED: &str = "EndpointDisabled";

/// `MessageStructure` value telling the broker that `message` holds one payload per platform.
pub const MESSAGE_STRUCTURE_JSON: &str = "json";

/// Errors returned by a push broker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    /// The broker answered with a machine-readable error code
    #[error("Broker rejected the request: {code}")]
    Service {
        code: String,
        message: Option<String>,
    },

    /// The call did not complete within the client's operation timeout
    #[error("Broker call timed out")]
    Timeout,

    /// Connection, signing or dispatch failure before a broker answer was received
    #[error("Broker transport error: {0}")]
    Transport(String),

    /// The broker answered successfully but without a field we rely on
    #[error("Broker response is missing {0}")]
    MalformedResponse(String),
}

impl BrokerError {
    pub fn service(code: impl Into<String>, message: Option<String>) -> Self {
        BrokerError::Service {
            code: code.into(),
            message,
        }
    }

    /// The broker error code, if the broker answered at all.
    pub fn code(&self) -> Option<&str> {
        match self {
            BrokerError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the target endpoint is permanently unusable.
    pub fn is_endpoint_disabled(&self) -> bool {
        self.code() == Some(ENDPOINT_DISABLED)
    }

    /// The error in the broker's response shape: `{"Error": {"Code": .., "Message": ..}}`.
    pub fn error_response(&self) -> Value {
        let mut error = Map::new();
        match self {
            BrokerError::Service { code, message } => {
                error.insert("Code".to_string(), Value::String(code.clone()));
                if let Some(message) = message {
                    error.insert("Message".to_string(), Value::String(message.clone()));
                }
            }
            other => {
                error.insert("Message".to_string(), Value::String(other.to_string()));
            }
        }
        json!({ "Error": error })
    }
}

/// A publish call against one platform endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub target_arn: String,
    /// Serialized `{envelope key: payload string}` mapping
    pub message: String,
    pub message_structure: String,
}

impl PublishRequest {
    pub fn json(target_arn: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target_arn: target_arn.into(),
            message: message.into(),
            message_structure: MESSAGE_STRUCTURE_JSON.to_string(),
        }
    }
}

/// The broker's answer to a successful publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub message_id: Option<String>,
    /// Raw response as the broker reported it, e.g. `{"MessageId": ".."}`
    pub raw: Value,
}

impl PublishResponse {
    pub fn with_message_id(message_id: impl Into<String>) -> Self {
        let message_id = message_id.into();
        Self {
            raw: json!({ "MessageId": message_id }),
            message_id: Some(message_id),
        }
    }
}

/// Operations the dispatcher needs from a mobile push broker.
pub trait PushBroker: Send + Sync {
    /// Registers `token` with the platform application and returns the endpoint ARN.
    fn create_platform_endpoint(
        &self,
        application_arn: &str,
        token: &str,
    ) -> BoxFuture<'_, String, BrokerError>;

    /// Publishes a message to a single endpoint.
    fn publish(&self, request: PublishRequest) -> BoxFuture<'_, PublishResponse, BrokerError>;
}
