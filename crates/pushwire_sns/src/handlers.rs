//! HTTP handlers for device registration and operator pushes
//!
//! The handlers are generic over the device and message stores, so the same router serves
//! the SQL stores in production and the in-memory stores in tests. Errors are returned as
//! [`PushwireError`], which renders as `{"error": {"message", "code"}}`.

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use pushwire_common::models::{Device, DeviceRegistration, PushMessage};
use pushwire_common::PushwireError;
use pushwire_db::{DeviceRepository, PushMessageRepository};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::handler::{DispatchHandler, DispatchOutcome};
use crate::notifiable::{Notifiable, Notifier};
use crate::payload::{SilentNotification, VisibleNotification};

/// Shared state for the push handlers
pub struct PushState<D, M> {
    pub handler: Arc<DispatchHandler<D, M>>,
    pub notifier: Notifier<D>,
}

/// Request body for deregistering a device
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeregisterDeviceRequest {
    pub user_id: String,
    pub push_token: String,
}

/// Request body for sending a visible push to a user
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendPushRequest {
    pub user_id: String,
    /// `badge` is taken as the recipient's badge count and defaults to 0
    #[serde(flatten)]
    pub notification: VisibleNotification,
}

/// Request body for sending a silent push to a user
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendSilentPushRequest {
    pub user_id: String,
    /// `badge` is taken as the recipient's badge count and defaults to 0
    #[serde(flatten)]
    pub notification: SilentNotification,
}

/// Response body for queued pushes
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendPushResponse {
    pub queued: bool,
    pub user_id: String,
}

/// A recorded push message with its broker error, if any
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PushMessageView {
    #[serde(flatten)]
    pub message: PushMessage,
    pub error_message: Option<String>,
}

impl From<PushMessage> for PushMessageView {
    fn from(message: PushMessage) -> Self {
        Self {
            error_message: message.error_message(),
            message,
        }
    }
}

/// The user addressed by an operator push.
struct Recipient {
    user_id: String,
    badge: u32,
}

impl Notifiable for Recipient {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn badge_count(&self) -> u32 {
        self.badge
    }
}

fn no_active_device(user_id: &str) -> PushwireError {
    PushwireError::NotFoundError(format!("user {} has no active device", user_id))
}

/// Registers (or re-registers) a device for push notifications
///
/// # Responses
///
/// - 201 Created: the stored device
/// - 409 Conflict: uniqueness violation
/// - 500 Internal Server Error: storage failure
pub async fn register_device_handler<D, M>(
    State(state): State<Arc<PushState<D, M>>>,
    Json(payload): Json<DeviceRegistration>,
) -> Result<(StatusCode, Json<Device>), PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    if payload.push_token.is_empty() {
        return Err(PushwireError::ValidationError(
            "push_token must not be empty".to_string(),
        ));
    }

    debug!("Registering device for user: {}", payload.user_id);
    let device = state.handler.devices().register_device(payload).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// Deregisters the caller's device by push token
///
/// # Responses
///
/// - 204 No Content: device invalidated
/// - 404 Not Found: the user has no active device with this token
pub async fn deregister_device_handler<D, M>(
    State(state): State<Arc<PushState<D, M>>>,
    Json(payload): Json<DeregisterDeviceRequest>,
) -> Result<StatusCode, PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    let devices = state.handler.devices();
    let device = devices
        .find_active_by_user_and_token(&payload.user_id, &payload.push_token)
        .await?
        .ok_or_else(|| PushwireError::NotFoundError("device not found".to_string()))?;

    devices.invalidate(device.id).await?;
    info!("Device {} deregistered by user {}", device.id, payload.user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Queues a visible push to a user's active device
///
/// # Responses
///
/// - 202 Accepted: job queued
/// - 404 Not Found: the user has no active device
pub async fn send_push_handler<D, M>(
    State(state): State<Arc<PushState<D, M>>>,
    Json(payload): Json<SendPushRequest>,
) -> Result<(StatusCode, Json<SendPushResponse>), PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    if payload.notification.message.is_empty() {
        return Err(PushwireError::ValidationError(
            "message must not be empty".to_string(),
        ));
    }

    let recipient = Recipient {
        user_id: payload.user_id,
        badge: payload.notification.badge.unwrap_or(0),
    };
    let queued = recipient
        .send_push_notification(&state.notifier, payload.notification)
        .await?;
    if !queued {
        return Err(no_active_device(&recipient.user_id));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SendPushResponse {
            queued,
            user_id: recipient.user_id,
        }),
    ))
}

/// Queues a silent push to a user's active device
pub async fn send_silent_push_handler<D, M>(
    State(state): State<Arc<PushState<D, M>>>,
    Json(payload): Json<SendSilentPushRequest>,
) -> Result<(StatusCode, Json<SendPushResponse>), PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    let recipient = Recipient {
        user_id: payload.user_id,
        badge: payload.notification.badge.unwrap_or(0),
    };
    let queued = recipient
        .send_silent_push_notification(&state.notifier, payload.notification)
        .await?;
    if !queued {
        return Err(no_active_device(&recipient.user_id));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SendPushResponse {
            queued,
            user_id: recipient.user_id,
        }),
    ))
}

/// Shows a recorded push message
pub async fn get_push_message_handler<D, M>(
    State(state): State<Arc<PushState<D, M>>>,
    Path(id): Path<i64>,
) -> Result<Json<PushMessageView>, PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    let message = state
        .handler
        .messages()
        .find_by_id(id)
        .await?
        .ok_or_else(|| PushwireError::NotFoundError(format!("push message {}", id)))?;

    Ok(Json(message.into()))
}

/// Sends a recorded push message again, synchronously
///
/// # Responses
///
/// - 200 OK: the new attempt's outcome (a disabled endpoint is reported, not failed)
/// - 404 Not Found: unknown message or device
/// - 409 Conflict: the device is inactive
/// - 502 Bad Gateway: SNS failure
pub async fn resend_push_message_handler<D, M>(
    State(state): State<Arc<PushState<D, M>>>,
    Path(id): Path<i64>,
) -> Result<Json<DispatchOutcome>, PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    let outcome = state.handler.resend(id).await?;
    Ok(Json(outcome))
}

/// Clears a device's endpoint so the next send registers it again
pub async fn reset_endpoint_handler<D, M>(
    State(state): State<Arc<PushState<D, M>>>,
    Path(id): Path<i64>,
) -> Result<Json<Device>, PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    let device = state.handler.reset_endpoint(id).await?;
    Ok(Json(device))
}
