//! Platform payloads for SNS mobile push
//!
//! A [`Notification`] is the logical message; [`PayloadBuilder`] turns it into the
//! multi-platform message SNS expects with `MessageStructure = json`:
//!
//! ```text
//! {"APNS": "{\"aps\": {...}}"}     iOS (APNS_SANDBOX when the sandbox is enabled)
//! {"GCM":  "{\"data\": {...}}"}    Android
//! ```
//!
//! The envelope value is itself a JSON string, so the message is serialized twice.

use pushwire_common::models::Platform;
use pushwire_config::SnsConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Longest message text that is sent, in characters.
pub const MAX_MESSAGE_CHARS: usize = 255;

/// Key in `custom` that carries the notification URL.
pub const URL_KEY: &str = "url";

const ALERT: &str = "alert";
const SOUND: &str = "sound";
const BADGE: &str = "badge";
const CUSTOM: &str = "custom";
const CATEGORY: &str = "category";
const CONTENT_AVAILABLE: &str = "content-available";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    /// A visible notification without message text
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A stored wire message that cannot be turned back into a notification
    #[error("Undecodable payload: {0}")]
    Undecodable(String),
}

/// Platform discriminator of a multi-platform SNS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeKey {
    #[serde(rename = "APNS")]
    Apns,
    #[serde(rename = "APNS_SANDBOX")]
    ApnsSandbox,
    #[serde(rename = "GCM")]
    Gcm,
}

impl EnvelopeKey {
    pub const ALL: [EnvelopeKey; 3] = [EnvelopeKey::Apns, EnvelopeKey::ApnsSandbox, EnvelopeKey::Gcm];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKey::Apns => "APNS",
            EnvelopeKey::ApnsSandbox => "APNS_SANDBOX",
            EnvelopeKey::Gcm => "GCM",
        }
    }

    /// Key the notification mapping is nested under inside the envelope value.
    pub fn wrapper(&self) -> &'static str {
        match self {
            EnvelopeKey::Apns | EnvelopeKey::ApnsSandbox => "aps",
            EnvelopeKey::Gcm => "data",
        }
    }
}

/// A notification shown to the user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VisibleNotification {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub custom: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Extra top-level keys, applied last
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub overrides: Map<String, Value>,
}

impl VisibleNotification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }
}

/// A background notification that wakes the app without showing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SilentNotification {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub custom: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(default = "default_content_available")]
    pub content_available: bool,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub overrides: Map<String, Value>,
}

fn default_content_available() -> bool {
    true
}

impl Default for SilentNotification {
    fn default() -> Self {
        Self {
            custom: Map::new(),
            badge: None,
            content_available: default_content_available(),
            overrides: Map::new(),
        }
    }
}

impl SilentNotification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn with_content_available(mut self, content_available: bool) -> Self {
        self.content_available = content_available;
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }
}

/// The logical notification, independent of the target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Visible(VisibleNotification),
    Silent(SilentNotification),
}

impl From<VisibleNotification> for Notification {
    fn from(notification: VisibleNotification) -> Self {
        Notification::Visible(notification)
    }
}

impl From<SilentNotification> for Notification {
    fn from(notification: SilentNotification) -> Self {
        Notification::Silent(notification)
    }
}

impl Notification {
    pub fn is_silent(&self) -> bool {
        matches!(self, Notification::Silent(_))
    }

    /// Text recorded as the audit body: the truncated message, empty for silent pushes.
    pub fn body(&self) -> String {
        match self {
            Notification::Visible(visible) => truncate_message(&visible.message),
            Notification::Silent(_) => String::new(),
        }
    }

    /// Decodes a stored wire message back into a notification.
    ///
    /// Keys the builder doesn't produce itself are restored as overrides.
    pub fn from_wire(message: &str) -> Result<Self, PayloadError> {
        let envelope: Map<String, Value> = serde_json::from_str(message)
            .map_err(|e| PayloadError::Undecodable(format!("message is not a JSON object: {}", e)))?;

        let (key, inner) = EnvelopeKey::ALL
            .iter()
            .find_map(|key| envelope.get(key.as_str()).map(|value| (*key, value)))
            .ok_or_else(|| PayloadError::Undecodable("no APNS or GCM payload".to_string()))?;

        let inner = inner
            .as_str()
            .ok_or_else(|| PayloadError::Undecodable(format!("{} payload is not a string", key.as_str())))?;
        let mut wrapped: Map<String, Value> = serde_json::from_str(inner)
            .map_err(|e| PayloadError::Undecodable(format!("{} payload: {}", key.as_str(), e)))?;

        let mut data = match wrapped.remove(key.wrapper()) {
            Some(Value::Object(data)) => data,
            _ => {
                return Err(PayloadError::Undecodable(format!(
                    "{} payload has no {:?} object",
                    key.as_str(),
                    key.wrapper()
                )))
            }
        };

        let custom = take_if(&mut data, CUSTOM, |value| value.as_object().cloned())
            .unwrap_or_default();
        let badge = take_if(&mut data, BADGE, |value| {
            value.as_u64().and_then(|badge| u32::try_from(badge).ok())
        });

        match data.remove(ALERT) {
            Some(alert) => {
                let message = alert
                    .as_str()
                    .ok_or_else(|| PayloadError::Undecodable("alert is not a string".to_string()))?
                    .to_string();
                let url = custom.get(URL_KEY).and_then(Value::as_str).map(str::to_string);
                let sound = take_if(&mut data, SOUND, string_value);
                let category = take_if(&mut data, CATEGORY, string_value);

                Ok(Notification::Visible(VisibleNotification {
                    message,
                    url,
                    badge,
                    sound,
                    custom,
                    category,
                    overrides: data,
                }))
            }
            None => {
                let content_available = take_if(&mut data, CONTENT_AVAILABLE, Value::as_bool)
                    .unwrap_or_else(default_content_available);
                // Silent payloads always carry an empty sound; anything else was an override.
                take_if(&mut data, SOUND, |value| (value.as_str() == Some("")).then_some(()));

                Ok(Notification::Silent(SilentNotification {
                    custom,
                    badge,
                    content_available,
                    overrides: data,
                }))
            }
        }
    }
}

// Removes `key` only when `decode` accepts its value; anything else stays behind as an override.
fn take_if<T>(
    data: &mut Map<String, Value>,
    key: &str,
    decode: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let decoded = decode(data.get(key)?)?;
    data.remove(key);
    Some(decoded)
}

fn string_value(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Cuts `message` to at most [`MAX_MESSAGE_CHARS`] characters.
pub fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// A serialized broker message ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PushPayload {
    pub envelope: EnvelopeKey,
    /// Text recorded as the audit body
    pub body: String,
    /// `{envelope: "<json>"}`, sent as the publish `Message`
    pub message: String,
}

/// Builds platform payloads from notifications.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    ios_sandbox: bool,
    default_sound: Option<String>,
}

impl PayloadBuilder {
    pub fn new(ios_sandbox: bool, default_sound: Option<String>) -> Self {
        Self {
            ios_sandbox,
            default_sound: default_sound.filter(|sound| !sound.is_empty()),
        }
    }

    pub fn from_config(config: &SnsConfig) -> Self {
        Self::new(config.ios_sandbox_enabled, config.default_sound.clone())
    }

    pub fn envelope_key(&self, platform: Platform) -> EnvelopeKey {
        match platform {
            Platform::Ios if self.ios_sandbox => EnvelopeKey::ApnsSandbox,
            Platform::Ios => EnvelopeKey::Apns,
            Platform::Android => EnvelopeKey::Gcm,
        }
    }

    /// The notification mapping placed under `aps` / `data`.
    pub fn notification_data(
        &self,
        notification: &Notification,
    ) -> Result<Map<String, Value>, PayloadError> {
        match notification {
            Notification::Visible(visible) => self.visible_data(visible),
            Notification::Silent(silent) => Ok(silent_data(silent)),
        }
    }

    fn visible_data(
        &self,
        visible: &VisibleNotification,
    ) -> Result<Map<String, Value>, PayloadError> {
        let message = truncate_message(&visible.message);
        if message.is_empty() {
            return Err(PayloadError::InvalidPayload(
                "visible notification requires message text".to_string(),
            ));
        }

        let mut custom = visible.custom.clone();
        if let Some(url) = visible.url.as_deref().filter(|url| !url.is_empty()) {
            custom.insert(URL_KEY.to_string(), Value::String(url.to_string()));
        }

        let sound = visible
            .sound
            .clone()
            .or_else(|| self.default_sound.clone());

        let mut data = Map::new();
        data.insert(ALERT.to_string(), Value::String(message));
        if let Some(sound) = sound {
            data.insert(SOUND.to_string(), Value::String(sound));
        }
        data.insert(CUSTOM.to_string(), Value::Object(custom));
        if let Some(badge) = visible.badge {
            data.insert(BADGE.to_string(), Value::from(badge));
        }
        if let Some(category) = &visible.category {
            data.insert(CATEGORY.to_string(), Value::String(category.clone()));
        }
        apply_overrides(&mut data, &visible.overrides);
        Ok(data)
    }

    /// Builds the publishable message for one platform.
    ///
    /// # Errors
    ///
    /// `PayloadError::InvalidPayload` if a visible notification has no message text.
    pub fn build(
        &self,
        platform: Platform,
        notification: &Notification,
    ) -> Result<PushPayload, PayloadError> {
        let envelope = self.envelope_key(platform);
        let data = self.notification_data(notification)?;

        let mut wrapped = Map::new();
        wrapped.insert(envelope.wrapper().to_string(), Value::Object(data));
        let inner = Value::Object(wrapped).to_string();

        let mut outer = Map::new();
        outer.insert(envelope.as_str().to_string(), Value::String(inner));

        Ok(PushPayload {
            envelope,
            body: notification.body(),
            message: Value::Object(outer).to_string(),
        })
    }
}

fn silent_data(silent: &SilentNotification) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(
        CONTENT_AVAILABLE.to_string(),
        Value::Bool(silent.content_available),
    );
    data.insert(SOUND.to_string(), Value::String(String::new()));
    if let Some(badge) = silent.badge {
        data.insert(BADGE.to_string(), Value::from(badge));
    }
    data.insert(CUSTOM.to_string(), Value::Object(silent.custom.clone()));
    apply_overrides(&mut data, &silent.overrides);
    data
}

fn apply_overrides(data: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        data.insert(key.clone(), value.clone());
    }
}
