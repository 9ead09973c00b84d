// --- File: crates/pushwire_common/src/lib.rs ---

pub mod error; // Error handling
pub mod http; // HTTP error responses
pub mod logging; // Logging utilities
pub mod models; // Devices and push message records
pub mod services; // Push broker abstraction

pub use error::{external_service_error, HttpStatusCode, PushwireError};

pub use http::IntoHttpResponse;

pub use logging::{init, init_with_level};

pub use models::{Device, DeviceRegistration, DeviceState, NewPushMessage, Platform, PushMessage};

pub use services::{
    BoxFuture, BrokerError, PublishRequest, PublishResponse, PushBroker, ENDPOINT_DISABLED,
    MESSAGE_STRUCTURE_JSON,
};
