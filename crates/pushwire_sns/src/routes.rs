use axum::{
    routing::{get, post},
    Router,
};
use pushwire_db::{DeviceRepository, PushMessageRepository};
use std::sync::Arc;
use tracing::info;

use crate::handler::DispatchHandler;
use crate::handlers::{
    deregister_device_handler, get_push_message_handler, register_device_handler,
    resend_push_message_handler, reset_endpoint_handler, send_push_handler,
    send_silent_push_handler, PushState,
};
use crate::notifiable::Notifier;

/// Create the push routes for the API
///
/// # Arguments
///
/// * `handler` - The dispatch handler used for synchronous operator actions
/// * `notifier` - Queues pushes for users
///
/// # Returns
///
/// An Axum router with the device and push endpoints
pub fn routes<D, M>(handler: Arc<DispatchHandler<D, M>>, notifier: Notifier<D>) -> Router
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    let state = Arc::new(PushState { handler, notifier });

    info!("Push routes initialized");

    Router::new()
        .route(
            "/devices",
            post(register_device_handler::<D, M>).delete(deregister_device_handler::<D, M>),
        )
        .route(
            "/devices/{id}/reset-endpoint",
            post(reset_endpoint_handler::<D, M>),
        )
        .route("/push/send", post(send_push_handler::<D, M>))
        .route("/push/send-silent", post(send_silent_push_handler::<D, M>))
        .route("/push/messages/{id}", get(get_push_message_handler::<D, M>))
        .route(
            "/push/messages/{id}/resend",
            post(resend_push_message_handler::<D, M>),
        )
        .with_state(state)
}
