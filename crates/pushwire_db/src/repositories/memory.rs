//! In-memory repositories
//!
//! Used by tests and local runs without a database. They enforce the same uniqueness
//! constraints as the SQL tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pushwire_common::models::{Device, DeviceRegistration, NewPushMessage, PushMessage};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::DbError;
use crate::repository::{DeviceRepository, PushMessageRepository};

#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory device store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceRepository {
    devices: Arc<Mutex<Table<Device>>>,
}

impl MemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored devices, ordered by id
    pub async fn all(&self) -> Vec<Device> {
        self.devices.lock().await.rows.values().cloned().collect()
    }
}

impl DeviceRepository for MemoryDeviceRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn register_device(&self, registration: DeviceRegistration) -> Result<Device, DbError> {
        let mut table = self.devices.lock().await;
        let now = Utc::now();

        let existing = table.rows.values_mut().find(|d| {
            d.push_token.as_deref() == Some(registration.push_token.as_str())
                && d.platform == registration.platform
        });

        if let Some(device) = existing {
            if !device.is_active() {
                device.sns_platform_endpoint_arn = None;
            }
            device.user_id = registration.user_id;
            device.locale = registration.locale;
            device.model = registration.model;
            device.deleted_at = None;
            device.date_updated = now;
            debug!("Updated device {} in memory", device.id);
            return Ok(device.clone());
        }

        let id = table.allocate_id();
        let device = Device {
            id,
            user_id: registration.user_id,
            platform: registration.platform,
            push_token: Some(registration.push_token),
            sns_platform_endpoint_arn: None,
            locale: registration.locale,
            model: registration.model,
            deleted_at: None,
            date_created: now,
            date_updated: now,
        };
        table.rows.insert(id, device.clone());
        Ok(device)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Device>, DbError> {
        Ok(self.devices.lock().await.rows.get(&id).cloned())
    }

    async fn find_latest_active_for_user(&self, user_id: &str) -> Result<Option<Device>, DbError> {
        let table = self.devices.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|d| d.user_id == user_id && d.is_active() && d.push_token.is_some())
            .max_by_key(|d| (d.date_updated, d.id))
            .cloned())
    }

    async fn find_active_by_user_and_token(
        &self,
        user_id: &str,
        push_token: &str,
    ) -> Result<Option<Device>, DbError> {
        let table = self.devices.lock().await;
        Ok(table
            .rows
            .values()
            .find(|d| {
                d.user_id == user_id
                    && d.is_active()
                    && d.push_token.as_deref() == Some(push_token)
            })
            .cloned())
    }

    async fn update_endpoint_arn(&self, id: i64, endpoint_arn: &str) -> Result<(), DbError> {
        let mut table = self.devices.lock().await;

        let taken = table.rows.values().any(|d| {
            d.id != id && d.sns_platform_endpoint_arn.as_deref() == Some(endpoint_arn)
        });
        if taken {
            return Err(DbError::Conflict(format!(
                "endpoint {} already belongs to another device",
                endpoint_arn
            )));
        }

        let device = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("device {}", id)))?;
        device.sns_platform_endpoint_arn = Some(endpoint_arn.to_string());
        Ok(())
    }

    async fn invalidate(&self, id: i64) -> Result<DateTime<Utc>, DbError> {
        let mut table = self.devices.lock().await;
        let device = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("device {}", id)))?;

        Ok(*device.deleted_at.get_or_insert_with(Utc::now))
    }

    async fn reset_endpoint(&self, id: i64) -> Result<(), DbError> {
        let mut table = self.devices.lock().await;
        let device = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("device {}", id)))?;

        device.sns_platform_endpoint_arn = None;
        Ok(())
    }
}

/// In-memory push message audit log. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryPushMessageRepository {
    messages: Arc<Mutex<Table<PushMessage>>>,
}

impl MemoryPushMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records, oldest first
    pub async fn all(&self) -> Vec<PushMessage> {
        self.messages.lock().await.rows.values().cloned().collect()
    }
}

impl PushMessageRepository for MemoryPushMessageRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn create(&self, message: NewPushMessage) -> Result<PushMessage, DbError> {
        let mut table = self.messages.lock().await;

        if let Some(message_id) = message.sns_message_id.as_deref() {
            let duplicate = table
                .rows
                .values()
                .any(|m| m.sns_message_id.as_deref() == Some(message_id));
            if duplicate {
                return Err(DbError::Conflict(format!(
                    "message id {} already recorded",
                    message_id
                )));
            }
        }

        let now = Utc::now();
        let id = table.allocate_id();
        let record = PushMessage {
            id,
            device_id: message.device_id,
            body: message.body,
            data: message.data,
            sns_message_id: message.sns_message_id,
            sns_response: message.sns_response,
            date_created: now,
            date_updated: now,
        };
        table.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PushMessage>, DbError> {
        Ok(self.messages.lock().await.rows.get(&id).cloned())
    }

    async fn find_by_device(&self, device_id: i64) -> Result<Vec<PushMessage>, DbError> {
        let table = self.messages.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|m| m.device_id == device_id)
            .cloned()
            .collect())
    }
}
