// --- File: crates/pushwire_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Database Config ---
// The table names bind the concrete "device" and "push message" storage the dispatcher works on.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite://data/pushwire.db, via PUSHWIRE_DATABASE__URL
    #[serde(default = "default_device_table")]
    pub device_table: String,
    #[serde(default = "default_message_table")]
    pub message_table: String,
}

fn default_device_table() -> String {
    "devices".to_string()
}

fn default_message_table() -> String {
    "push_messages".to_string()
}

// --- SNS Config ---
// Credentials may be left empty to fall back to the default AWS provider chain.
// Use "secret_from_env" to pull a value from the environment (e.g. SNS_SECRET_ACCESS_KEY).
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SnsConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Overrides the SNS endpoint, e.g. for a local emulator.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default)]
    pub ios_application_arn: Option<String>,
    #[serde(default)]
    pub ios_sandbox_application_arn: Option<String>,
    #[serde(default)]
    pub android_application_arn: Option<String>,
    /// Sends iOS pushes through the APNS sandbox application and envelope.
    #[serde(default)]
    pub ios_sandbox_enabled: bool,

    #[serde(default)]
    pub default_sound: Option<String>,
    /// Writes one audit record per dispatch attempt.
    #[serde(default = "default_true")]
    pub log_sent_messages: bool,
    /// Upper bound for a single broker operation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SnsConfig {
    fn default() -> Self {
        Self {
            region: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            ios_application_arn: None,
            ios_sandbox_application_arn: None,
            android_application_arn: None,
            ios_sandbox_enabled: false,
            default_sound: None,
            log_sent_messages: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

// --- Dispatch worker Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub sns: SnsConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}
