//! Lazily registers devices with SNS
//!
//! A device gets its platform endpoint on the first send; afterwards the cached ARN is reused
//! without talking to the broker.

use std::sync::Arc;

use pushwire_common::models::{Device, Platform};
use pushwire_common::PushBroker;
use pushwire_config::SnsConfig;
use pushwire_db::DeviceRepository;
use tracing::{debug, info};

use crate::error::DispatchError;

/// SNS platform application ARNs, one per push service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationArns {
    pub ios: Option<String>,
    pub ios_sandbox: Option<String>,
    pub android: Option<String>,
    pub ios_sandbox_enabled: bool,
}

impl ApplicationArns {
    pub fn from_config(config: &SnsConfig) -> Self {
        Self {
            ios: config.ios_application_arn.clone(),
            ios_sandbox: config.ios_sandbox_application_arn.clone(),
            android: config.android_application_arn.clone(),
            ios_sandbox_enabled: config.ios_sandbox_enabled,
        }
    }

    /// The application a device of `platform` is registered with.
    ///
    /// # Errors
    ///
    /// `DispatchError::Config` if the ARN is not configured.
    pub fn for_platform(&self, platform: Platform) -> Result<&str, DispatchError> {
        let (arn, setting) = match platform {
            Platform::Ios if self.ios_sandbox_enabled => {
                (&self.ios_sandbox, "sns.ios_sandbox_application_arn")
            }
            Platform::Ios => (&self.ios, "sns.ios_application_arn"),
            Platform::Android => (&self.android, "sns.android_application_arn"),
        };

        arn.as_deref()
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| DispatchError::Config(format!("{} is not configured", setting)))
    }
}

/// Maps devices to SNS platform endpoints.
pub struct EndpointResolver<D> {
    broker: Arc<dyn PushBroker>,
    devices: D,
    arns: ApplicationArns,
}

impl<D: DeviceRepository> EndpointResolver<D> {
    pub fn new(broker: Arc<dyn PushBroker>, devices: D, arns: ApplicationArns) -> Self {
        Self {
            broker,
            devices,
            arns,
        }
    }

    pub fn arns(&self) -> &ApplicationArns {
        &self.arns
    }

    /// Returns the device's endpoint ARN, registering the device with SNS first if needed.
    ///
    /// A new ARN is stored on `device` and persisted (only the endpoint column is written).
    /// Concurrent calls for one device may both register; the broker returns the same
    /// endpoint for the same token and the last write wins.
    pub async fn resolve(&self, device: &mut Device) -> Result<String, DispatchError> {
        if let Some(endpoint_arn) = &device.sns_platform_endpoint_arn {
            debug!("Device {} has cached endpoint", device.id);
            return Ok(endpoint_arn.clone());
        }

        let token = device
            .push_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(DispatchError::MissingPushToken(device.id))?;
        let application_arn = self.arns.for_platform(device.platform)?;

        let endpoint_arn = self
            .broker
            .create_platform_endpoint(application_arn, token)
            .await?;

        self.devices
            .update_endpoint_arn(device.id, &endpoint_arn)
            .await?;
        device.sns_platform_endpoint_arn = Some(endpoint_arn.clone());

        info!("Registered device {} as {}", device.id, endpoint_arn);
        Ok(endpoint_arn)
    }
}
