//! The dispatch handler
//!
//! One call to [`DispatchHandler::send`] is one dispatch attempt:
//!
//! 1. refuse inactive devices
//! 2. build the platform payload
//! 3. resolve (or lazily create) the SNS endpoint
//! 4. publish
//! 5. classify the answer; `EndpointDisabled` soft-deletes the device and is not an error
//! 6. write the audit record (when enabled)
//!
//! Failures in steps 2-4 and unhandled broker errors propagate and leave no audit record.

use std::sync::Arc;

use pushwire_common::models::{Device, NewPushMessage, PushMessage};
use pushwire_common::{PublishRequest, PushBroker};
use pushwire_config::SnsConfig;
use pushwire_db::{DeviceRepository, PushMessageRepository};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::endpoint::{ApplicationArns, EndpointResolver};
use crate::error::DispatchError;
use crate::payload::{Notification, PayloadBuilder};

/// Result of a dispatch attempt that reached the broker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DispatchOutcome {
    /// The published wire message
    pub message: String,
    /// Raw broker response, or the handled error in broker error shape
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub response: Value,
    pub message_id: Option<String>,
    /// The broker reported the endpoint as disabled and the device was invalidated
    pub endpoint_disabled: bool,
    /// Audit record, unless sent-message logging is disabled
    pub record: Option<PushMessage>,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        self.message_id.is_some()
    }
}

/// Sends notifications to single devices through SNS.
pub struct DispatchHandler<D, M> {
    broker: Arc<dyn PushBroker>,
    devices: D,
    messages: M,
    builder: PayloadBuilder,
    resolver: EndpointResolver<D>,
    log_sent_messages: bool,
}

impl<D, M> DispatchHandler<D, M>
where
    D: DeviceRepository + Clone,
    M: PushMessageRepository,
{
    /// Creates a handler from the SNS configuration
    ///
    /// # Arguments
    ///
    /// * `broker` - The push broker, shared by all attempts
    /// * `devices` - Device store; endpoint ARNs and invalidations are written here
    /// * `messages` - Audit log store
    /// * `config` - Application ARNs, sandbox toggle, default sound and audit flag
    pub fn new(broker: Arc<dyn PushBroker>, devices: D, messages: M, config: &SnsConfig) -> Self {
        Self::with_parts(
            broker,
            devices,
            messages,
            PayloadBuilder::from_config(config),
            ApplicationArns::from_config(config),
            config.log_sent_messages,
        )
    }

    pub fn with_parts(
        broker: Arc<dyn PushBroker>,
        devices: D,
        messages: M,
        builder: PayloadBuilder,
        arns: ApplicationArns,
        log_sent_messages: bool,
    ) -> Self {
        let resolver = EndpointResolver::new(broker.clone(), devices.clone(), arns);
        Self {
            broker,
            devices,
            messages,
            builder,
            resolver,
            log_sent_messages,
        }
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    pub fn messages(&self) -> &M {
        &self.messages
    }

    pub fn builder(&self) -> &PayloadBuilder {
        &self.builder
    }

    /// Loads the device and runs one attempt against it.
    pub async fn dispatch(
        &self,
        device_id: i64,
        notification: &Notification,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut device = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or(DispatchError::DeviceNotFound(device_id))?;

        self.send(&mut device, notification).await
    }

    /// Runs one dispatch attempt; `device` reflects the endpoint and soft-delete updates.
    pub async fn send(
        &self,
        device: &mut Device,
        notification: &Notification,
    ) -> Result<DispatchOutcome, DispatchError> {
        if !device.is_active() {
            debug!("Skipping inactive device {}", device.id);
            return Err(DispatchError::DeviceInactive(device.id));
        }

        let payload = self.builder.build(device.platform, notification)?;
        let endpoint_arn = self.resolver.resolve(device).await?;

        debug!("Publishing to {}: {}", endpoint_arn, payload.message);
        let published = self
            .broker
            .publish(PublishRequest::json(endpoint_arn, payload.message.clone()))
            .await;

        let (message_id, response, endpoint_disabled) = match published {
            Ok(response) => {
                info!("Push delivered to device {}", device.id);
                (response.message_id, response.raw, false)
            }
            Err(err) if err.is_endpoint_disabled() => {
                warn!(
                    "Endpoint of device {} is disabled, invalidating device",
                    device.id
                );
                let deleted_at = self.devices.invalidate(device.id).await?;
                device.deleted_at = Some(deleted_at);
                (None, err.error_response(), true)
            }
            Err(err) => {
                error!("Publishing to device {} failed: {}", device.id, err);
                return Err(err.into());
            }
        };

        let record = if self.log_sent_messages {
            let record = self
                .messages
                .create(NewPushMessage {
                    device_id: device.id,
                    body: payload.body,
                    data: payload.message.clone(),
                    sns_message_id: message_id.clone(),
                    sns_response: response.to_string(),
                })
                .await?;
            Some(record)
        } else {
            None
        };

        Ok(DispatchOutcome {
            message: payload.message,
            response,
            message_id,
            endpoint_disabled,
            record,
        })
    }

    /// Sends a recorded push message again to the same device.
    ///
    /// The stored wire message is decoded back into a notification, so the current sandbox
    /// and default-sound settings apply to the new attempt.
    pub async fn resend(&self, push_message_id: i64) -> Result<DispatchOutcome, DispatchError> {
        let record = self
            .messages
            .find_by_id(push_message_id)
            .await?
            .ok_or(DispatchError::MessageNotFound(push_message_id))?;

        let notification = Notification::from_wire(&record.data)?;
        info!(
            "Resending push message {} to device {}",
            record.id, record.device_id
        );
        self.dispatch(record.device_id, &notification).await
    }

    /// Forgets the device's endpoint so the next send registers it again.
    pub async fn reset_endpoint(&self, device_id: i64) -> Result<Device, DispatchError> {
        self.devices.reset_endpoint(device_id).await.map_err(|err| match err {
            pushwire_db::DbError::NotFound(_) => DispatchError::DeviceNotFound(device_id),
            other => DispatchError::Storage(other),
        })?;

        self.devices
            .find_by_id(device_id)
            .await?
            .ok_or(DispatchError::DeviceNotFound(device_id))
    }
}
