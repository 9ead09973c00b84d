//! Repository traits for database access
//!
//! The dispatcher is generic over these traits, so the SQL stores can be replaced by the
//! in-memory ones in tests.

use std::future::Future;

use chrono::{DateTime, Utc};
use pushwire_common::models::{Device, DeviceRegistration, NewPushMessage, PushMessage};

use crate::error::DbError;

/// Storage of devices and their broker endpoints.
pub trait DeviceRepository: Send + Sync {
    /// Creates the device table if it doesn't exist yet
    fn init_schema(&self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Register a device
    ///
    /// Registrations are keyed by `(push_token, platform)`. A known pair is moved to the
    /// registering user with refreshed locale and model; if it had been invalidated it is
    /// reactivated and its stale endpoint ARN is cleared.
    ///
    /// # Returns
    ///
    /// The stored device with its ID and timestamps set
    fn register_device(
        &self,
        registration: DeviceRegistration,
    ) -> impl Future<Output = Result<Device, DbError>> + Send;

    fn find_by_id(&self, id: i64) -> impl Future<Output = Result<Option<Device>, DbError>> + Send;

    /// The most recently updated active device of `user_id` that has a push token
    fn find_latest_active_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Device>, DbError>> + Send;

    fn find_active_by_user_and_token(
        &self,
        user_id: &str,
        push_token: &str,
    ) -> impl Future<Output = Result<Option<Device>, DbError>> + Send;

    /// Stores the broker endpoint ARN, touching no other column
    ///
    /// # Errors
    ///
    /// `DbError::Conflict` if another device already holds `endpoint_arn`,
    /// `DbError::NotFound` if the device doesn't exist.
    fn update_endpoint_arn(
        &self,
        id: i64,
        endpoint_arn: &str,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Soft-deletes the device and returns its deletion timestamp
    ///
    /// Invalidating an already inactive device keeps the original timestamp. `date_updated` is
    /// left as is.
    fn invalidate(&self, id: i64) -> impl Future<Output = Result<DateTime<Utc>, DbError>> + Send;

    /// Forgets the cached endpoint ARN so the next send registers a fresh one
    fn reset_endpoint(&self, id: i64) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Append-only audit log of dispatch attempts.
pub trait PushMessageRepository: Send + Sync {
    fn init_schema(&self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Persists one audit record
    ///
    /// # Errors
    ///
    /// `DbError::Conflict` if `sns_message_id` is already recorded.
    fn create(
        &self,
        message: NewPushMessage,
    ) -> impl Future<Output = Result<PushMessage, DbError>> + Send;

    fn find_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<PushMessage>, DbError>> + Send;

    /// All records of one device, oldest first
    fn find_by_device(
        &self,
        device_id: i64,
    ) -> impl Future<Output = Result<Vec<PushMessage>, DbError>> + Send;
}

/// A trait for database repository factories
///
/// It is generic over the repository type and the configuration type.
pub trait RepositoryFactory<R, C> {
    /// Create a new repository instance
    fn create_repository(&self, config: C) -> R;
}
