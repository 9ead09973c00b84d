#![allow(dead_code)]
use utoipa::OpenApi;

use crate::handler::DispatchOutcome;
use crate::handlers::{
    DeregisterDeviceRequest, PushMessageView, SendPushRequest, SendPushResponse,
    SendSilentPushRequest,
};
use crate::payload::{Notification, SilentNotification, VisibleNotification};
use pushwire_common::models::{Device, DeviceRegistration, Platform, PushMessage};

#[utoipa::path(
    post,
    path = "/devices",
    request_body(content = DeviceRegistration, example = json!({
        "user_id": "user123",
        "push_token": "740f4707bebcf74f9b7c25d48e3358945f6aa01da5ddb387462c7eaf61bb78ad",
        "platform": "ios",
        "locale": "en_US",
        "model": "iPhone15,2"
    })),
    responses(
        (status = 201, description = "Device registered", body = Device),
        (status = 400, description = "Empty push token"),
        (status = 409, description = "Push token or endpoint already taken")
    ),
    tag = "Devices"
)]
fn doc_register_device_handler() {}

#[utoipa::path(
    delete,
    path = "/devices",
    request_body(content = DeregisterDeviceRequest, example = json!({
        "user_id": "user123",
        "push_token": "740f4707bebcf74f9b7c25d48e3358945f6aa01da5ddb387462c7eaf61bb78ad"
    })),
    responses(
        (status = 204, description = "Device invalidated"),
        (status = 404, description = "The user has no active device with this token")
    ),
    tag = "Devices"
)]
fn doc_deregister_device_handler() {}

#[utoipa::path(
    post,
    path = "/devices/{id}/reset-endpoint",
    params(("id" = i64, Path, description = "Device id")),
    responses(
        (status = 200, description = "Endpoint cleared", body = Device),
        (status = 404, description = "Unknown device")
    ),
    tag = "Devices"
)]
fn doc_reset_endpoint_handler() {}

#[utoipa::path(
    post,
    path = "/push/send",
    request_body(content = SendPushRequest, example = json!({
        "user_id": "user123",
        "message": "Your order has shipped",
        "url": "https://example.com/orders/42",
        "category": "order"
    })),
    responses(
        (status = 202, description = "Push queued", body = SendPushResponse,
         example = json!({"queued": true, "user_id": "user123"})),
        (status = 400, description = "Empty message"),
        (status = 404, description = "The user has no active device")
    ),
    tag = "Push"
)]
fn doc_send_push_handler() {}

#[utoipa::path(
    post,
    path = "/push/send-silent",
    request_body(content = SendSilentPushRequest, example = json!({
        "user_id": "user123",
        "custom": {"sync": "inbox"}
    })),
    responses(
        (status = 202, description = "Push queued", body = SendPushResponse),
        (status = 404, description = "The user has no active device")
    ),
    tag = "Push"
)]
fn doc_send_silent_push_handler() {}

#[utoipa::path(
    get,
    path = "/push/messages/{id}",
    params(("id" = i64, Path, description = "Push message id")),
    responses(
        (status = 200, description = "Recorded push message", body = PushMessageView),
        (status = 404, description = "Unknown push message")
    ),
    tag = "Push"
)]
fn doc_get_push_message_handler() {}

#[utoipa::path(
    post,
    path = "/push/messages/{id}/resend",
    params(("id" = i64, Path, description = "Push message id")),
    responses(
        (status = 200, description = "Outcome of the new attempt", body = DispatchOutcome,
         example = json!({
             "message": "{\"GCM\":\"{\\\"data\\\":{\\\"alert\\\":\\\"hi\\\",\\\"custom\\\":{}}}\"}",
             "response": {"MessageId": "5a9e1b7c-1d2e-4f3a-9b8c-7d6e5f4a3b2c"},
             "message_id": "5a9e1b7c-1d2e-4f3a-9b8c-7d6e5f4a3b2c",
             "endpoint_disabled": false,
             "record": null
         })),
        (status = 404, description = "Unknown push message or device"),
        (status = 409, description = "The device is inactive"),
        (status = 502, description = "SNS failure")
    ),
    tag = "Push"
)]
fn doc_resend_push_message_handler() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        doc_register_device_handler,
        doc_deregister_device_handler,
        doc_reset_endpoint_handler,
        doc_send_push_handler,
        doc_send_silent_push_handler,
        doc_get_push_message_handler,
        doc_resend_push_message_handler,
    ),
    components(
        schemas(
            Device,
            DeviceRegistration,
            Platform,
            PushMessage,
            PushMessageView,
            DeregisterDeviceRequest,
            SendPushRequest,
            SendSilentPushRequest,
            SendPushResponse,
            DispatchOutcome,
            Notification,
            VisibleNotification,
            SilentNotification,
        )
    ),
    tags(
        (name = "Devices", description = "Device registration"),
        (name = "Push", description = "Push dispatch through Amazon SNS")
    ),
    servers(
        (url = "/api", description = "Pushwire API server")
    )
)]
pub struct PushApiDoc;
