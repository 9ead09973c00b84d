//! Sending pushes on behalf of users
//!
//! Any user-like type implements [`Notifiable`] to get push sending through a [`Notifier`].
//! Sends go to the user's most recently updated active device and run in the background.

use std::future::Future;

use pushwire_common::models::Device;
use pushwire_config::SnsConfig;
use pushwire_db::DeviceRepository;
use tracing::{debug, info};

use crate::error::DispatchError;
use crate::payload::{SilentNotification, VisibleNotification};
use crate::tasks::{DispatchJob, DispatchQueue};

/// Looks up a user's active device and queues dispatch jobs for it.
#[derive(Debug, Clone)]
pub struct Notifier<D> {
    devices: D,
    queue: DispatchQueue,
    default_sound: Option<String>,
}

impl<D: DeviceRepository> Notifier<D> {
    pub fn new(devices: D, queue: DispatchQueue, config: &SnsConfig) -> Self {
        Self {
            devices,
            queue,
            default_sound: config.default_sound.clone().filter(|s| !s.is_empty()),
        }
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// The user's most recently updated active device with a push token.
    pub async fn active_device(&self, user_id: &str) -> Result<Option<Device>, DispatchError> {
        Ok(self.devices.find_latest_active_for_user(user_id).await?)
    }

    /// Queues a visible push for the user; `false` if the user has no active device.
    ///
    /// `badge` replaces any badge already set on `notification`.
    pub async fn notify(
        &self,
        user_id: &str,
        badge: u32,
        mut notification: VisibleNotification,
    ) -> Result<bool, DispatchError> {
        let Some(device) = self.active_device(user_id).await? else {
            debug!("User {} has no active device", user_id);
            return Ok(false);
        };

        if notification.sound.is_none() {
            notification.sound = self.default_sound.clone();
        }
        notification.badge = Some(badge);

        self.queue.submit(DispatchJob::new(device.id, notification)).await?;
        info!("Queued push for user {} on device {}", user_id, device.id);
        Ok(true)
    }

    /// Queues a silent push for the user; `false` if the user has no active device.
    pub async fn notify_silent(
        &self,
        user_id: &str,
        badge: u32,
        mut notification: SilentNotification,
    ) -> Result<bool, DispatchError> {
        let Some(device) = self.active_device(user_id).await? else {
            debug!("User {} has no active device", user_id);
            return Ok(false);
        };

        notification.badge = Some(badge);

        self.queue.submit(DispatchJob::new(device.id, notification)).await?;
        info!("Queued silent push for user {} on device {}", user_id, device.id);
        Ok(true)
    }
}

/// A user that can receive push notifications.
pub trait Notifiable: Send + Sync {
    fn user_id(&self) -> &str;

    /// Badge shown with every push to this user, whatever the notification carries
    fn badge_count(&self) -> u32 {
        0
    }

    fn active_device<'a, D: DeviceRepository>(
        &'a self,
        notifier: &'a Notifier<D>,
    ) -> impl Future<Output = Result<Option<Device>, DispatchError>> + Send + 'a {
        notifier.active_device(self.user_id())
    }

    /// Queues `notification` for the user's active device.
    ///
    /// Returns `false` if the user has no active device.
    fn send_push_notification<'a, D: DeviceRepository>(
        &'a self,
        notifier: &'a Notifier<D>,
        notification: VisibleNotification,
    ) -> impl Future<Output = Result<bool, DispatchError>> + Send + 'a {
        notifier.notify(self.user_id(), self.badge_count(), notification)
    }

    fn send_silent_push_notification<'a, D: DeviceRepository>(
        &'a self,
        notifier: &'a Notifier<D>,
        notification: SilentNotification,
    ) -> impl Future<Output = Result<bool, DispatchError>> + Send + 'a {
        notifier.notify_silent(self.user_id(), self.badge_count(), notification)
    }
}
