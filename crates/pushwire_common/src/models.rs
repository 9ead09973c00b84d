// --- File: crates/pushwire_common/src/models.rs ---

// Data structures shared by the storage, dispatch and HTTP layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PushwireError;

/// Mobile platform a device registered its push token for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PushwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(PushwireError::ValidationError(format!(
                "unknown platform: {}",
                other
            ))),
        }
    }
}

/// Where a device stands with respect to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    ActiveNoEndpoint,
    ActiveWithEndpoint,
    /// Terminal: nothing is ever dispatched to an inactive device.
    Inactive,
}

/// A user's device as known to the push broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Device {
    pub id: i64,

    /// The user owning this device
    pub user_id: String,

    pub platform: Platform,

    /// Provider-issued push token (APNs device token / FCM registration token)
    pub push_token: Option<String>,

    /// Cached SNS platform endpoint ARN, created lazily on the first send
    pub sns_platform_endpoint_arn: Option<String>,

    pub locale: String,

    /// Device model string as reported by the client
    pub model: String,

    /// Soft-delete marker; `Some` means the device must never be dispatched to
    pub deleted_at: Option<DateTime<Utc>>,

    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl Device {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn state(&self) -> DeviceState {
        match (&self.deleted_at, &self.sns_platform_endpoint_arn) {
            (Some(_), _) => DeviceState::Inactive,
            (None, Some(_)) => DeviceState::ActiveWithEndpoint,
            (None, None) => DeviceState::ActiveNoEndpoint,
        }
    }
}

/// Input for registering (or re-registering) a device.
///
/// A registration is keyed by `(push_token, platform)`: registering a known pair moves the
/// device to `user_id` and refreshes its locale and model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceRegistration {
    pub user_id: String,
    pub push_token: String,
    pub platform: Platform,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

pub fn default_locale() -> String {
    "en_US".to_string()
}

impl DeviceRegistration {
    /// Create a new device registration with default locale and an empty model
    pub fn new(user_id: impl Into<String>, push_token: impl Into<String>, platform: Platform) -> Self {
        Self {
            user_id: user_id.into(),
            push_token: push_token.into(),
            platform,
            model: String::new(),
            locale: default_locale(),
        }
    }
}

/// Audit record of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PushMessage {
    pub id: i64,
    pub device_id: i64,

    /// Message text as sent, empty for silent pushes
    pub body: String,

    /// Serialized multi-platform broker message
    pub data: String,

    /// Broker message id; `None` marks a failed send
    pub sns_message_id: Option<String>,

    /// Serialized raw broker response (or error response)
    pub sns_response: String,

    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl PushMessage {
    /// Extracts `Error.Message` from the stored broker response, if any.
    pub fn error_message(&self) -> Option<String> {
        let response: serde_json::Value = serde_json::from_str(&self.sns_response).ok()?;
        response
            .get("Error")?
            .get("Message")?
            .as_str()
            .map(str::to_string)
    }

    pub fn is_delivered(&self) -> bool {
        self.sns_message_id.is_some()
    }
}

/// Fields of a push message record before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPushMessage {
    pub device_id: i64,
    pub body: String,
    pub data: String,
    pub sns_message_id: Option<String>,
    pub sns_response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sns_response: &str) -> PushMessage {
        let now = Utc::now();
        PushMessage {
            id: 1,
            device_id: 1,
            body: "hello".to_string(),
            data: "{}".to_string(),
            sns_message_id: None,
            sns_response: sns_response.to_string(),
            date_created: now,
            date_updated: now,
        }
    }

    #[test]
    fn test_platform_parsing_is_case_insensitive() {
        assert_eq!("iOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!("android".parse::<Platform>().unwrap(), Platform::Android);
        assert!("windows".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Platform::Ios).unwrap(), "\"ios\"");
    }

    #[test]
    fn test_device_state_follows_endpoint_and_soft_delete() {
        let now = Utc::now();
        let mut device = Device {
            id: 1,
            user_id: "u1".to_string(),
            platform: Platform::Android,
            push_token: Some("token".to_string()),
            sns_platform_endpoint_arn: None,
            locale: default_locale(),
            model: String::new(),
            deleted_at: None,
            date_created: now,
            date_updated: now,
        };
        assert_eq!(device.state(), DeviceState::ActiveNoEndpoint);

        device.sns_platform_endpoint_arn = Some("arn".to_string());
        assert_eq!(device.state(), DeviceState::ActiveWithEndpoint);

        device.deleted_at = Some(now);
        assert_eq!(device.state(), DeviceState::Inactive);
        assert!(!device.is_active());
    }

    #[test]
    fn test_error_message_is_extracted_from_error_response() {
        let message = record(r#"{"Error": {"Code": "EndpointDisabled", "Message": "Endpoint is disabled"}}"#);
        assert_eq!(message.error_message().as_deref(), Some("Endpoint is disabled"));

        assert_eq!(record(r#"{"MessageId": "abc"}"#).error_message(), None);
        assert_eq!(record("not json").error_message(), None);
    }
}
