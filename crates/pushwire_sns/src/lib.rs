//! Amazon SNS mobile push dispatch for pushwire
//!
//! This crate sends push notifications to registered iOS and Android devices through
//! Amazon SNS platform applications.
//!
//! # Features
//!
//! - Platform payloads for APNs, the APNs sandbox and GCM/FCM
//! - Lazy creation of SNS platform endpoints, cached on the device
//! - Soft-deletion of devices whose endpoint SNS reports as disabled
//! - An optional audit log of every publish attempt
//! - A bounded background queue with retries for transient failures
//! - Axum routes for registration and operator actions
//! - OpenAPI/Swagger documentation (with the `openapi` feature)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pushwire_config::AppConfig;
//! use pushwire_db::{MemoryDeviceRepository, MemoryPushMessageRepository};
//! use pushwire_sns::{routes, DispatchHandler, DispatchQueue, Notifier, SnsClient};
//!
//! async fn setup_app(config: AppConfig) {
//!     let broker = Arc::new(SnsClient::new(&config.sns).await);
//!     let devices = MemoryDeviceRepository::new();
//!     let handler = Arc::new(DispatchHandler::new(
//!         broker,
//!         devices.clone(),
//!         MemoryPushMessageRepository::new(),
//!         &config.sns,
//!     ));
//!     let (queue, _workers) = DispatchQueue::spawn(handler.clone(), &config.dispatch);
//!     let app = routes(handler, Notifier::new(devices, queue, &config.sns));
//!     // Use the app with your Axum server
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `POST /devices` - Register a device
//! - `DELETE /devices` - Deregister a device
//! - `POST /devices/{id}/reset-endpoint` - Forget a device's SNS endpoint
//! - `POST /push/send` - Queue a visible push to a user
//! - `POST /push/send-silent` - Queue a silent push to a user
//! - `GET /push/messages/{id}` - Show a recorded push message
//! - `POST /push/messages/{id}/resend` - Send a recorded push message again

pub mod client;
#[cfg(feature = "openapi")]
pub mod doc;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod notifiable;
pub mod payload;
pub mod routes;
pub mod tasks;

pub use client::SnsClient;
pub use endpoint::{ApplicationArns, EndpointResolver};
pub use error::DispatchError;
pub use handler::{DispatchHandler, DispatchOutcome};
pub use notifiable::{Notifiable, Notifier};
pub use payload::{
    Notification, PayloadBuilder, PayloadError, PushPayload, SilentNotification,
    VisibleNotification,
};
pub use routes::routes;
pub use tasks::{run_job, DispatchJob, DispatchQueue, DispatchWorkers, RetryPolicy};

#[cfg(feature = "openapi")]
pub mod openapi {
    pub use crate::doc::PushApiDoc;
}
