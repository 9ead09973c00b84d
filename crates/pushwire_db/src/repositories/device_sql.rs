//! SQL implementation of the device repository

use chrono::{DateTime, Utc};
use pushwire_common::models::{Device, DeviceRegistration};
use pushwire_common::PushwireError;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

use crate::error::DbError;
use crate::repositories::{
    decode_timestamp, encode_timestamp, try_get_nullable, validate_table_name,
};
use crate::repository::DeviceRepository;
use crate::DbClient;

const DEVICE_COLUMNS: &str = "id, user_id, platform, push_token, sns_platform_endpoint_arn, \
                              locale, model, deleted_at, date_created, date_updated";

/// SQL implementation of the device repository
#[derive(Debug, Clone)]
pub struct SqlDeviceRepository {
    pub(crate) db_client: DbClient,
    pub(crate) table: String,
}

impl SqlDeviceRepository {
    /// Create a new SQL device repository bound to `table`
    ///
    /// # Errors
    ///
    /// `DbError::ConfigError` if `table` is not a plain SQL identifier.
    pub fn new(db_client: DbClient, table: impl Into<String>) -> Result<Self, DbError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { db_client, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

fn device_from_row(row: &AnyRow) -> Result<Device, DbError> {
    let platform: String = row.try_get("platform")?;
    let deleted_at = try_get_nullable(row, "deleted_at")?;
    let date_created: String = row.try_get("date_created")?;
    let date_updated: String = row.try_get("date_updated")?;

    Ok(Device {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        platform: platform
            .parse()
            .map_err(|e: PushwireError| DbError::DecodeError(e.to_string()))?,
        push_token: try_get_nullable(row, "push_token")?,
        sns_platform_endpoint_arn: try_get_nullable(row, "sns_platform_endpoint_arn")?,
        locale: row.try_get("locale")?,
        model: row.try_get("model")?,
        deleted_at: deleted_at.as_deref().map(decode_timestamp).transpose()?,
        date_created: decode_timestamp(&date_created)?,
        date_updated: decode_timestamp(&date_updated)?,
    })
}

impl DeviceRepository for SqlDeviceRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing device schema in table {}", self.table);

        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                push_token TEXT,
                sns_platform_endpoint_arn TEXT UNIQUE,
                locale TEXT NOT NULL DEFAULT 'en_US',
                model TEXT NOT NULL DEFAULT '',
                deleted_at TEXT,
                date_created TEXT NOT NULL,
                date_updated TEXT NOT NULL,
                UNIQUE(push_token, platform)
            )
            "#,
            table = self.table
        );
        self.db_client.execute(&query).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_user_id_idx ON {table} (user_id)",
            table = self.table
        );
        self.db_client.execute(&index).await?;

        info!("Device schema initialized successfully");
        Ok(())
    }

    async fn register_device(&self, registration: DeviceRegistration) -> Result<Device, DbError> {
        debug!(
            "Registering {} device for user: {}",
            registration.platform, registration.user_id
        );

        let now = encode_timestamp(&Utc::now());
        // A reactivated device must not reuse an endpoint the broker already disabled.
        let query = format!(
            "INSERT INTO {table} (user_id, platform, push_token, locale, model, \
             date_created, date_updated) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (push_token, platform) DO UPDATE SET \
             user_id = excluded.user_id, locale = excluded.locale, model = excluded.model, \
             sns_platform_endpoint_arn = CASE WHEN {table}.deleted_at IS NULL \
             THEN {table}.sns_platform_endpoint_arn ELSE NULL END, \
             deleted_at = NULL, date_updated = excluded.date_updated \
             RETURNING {columns}",
            table = self.table,
            columns = DEVICE_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(&registration.user_id)
            .bind(registration.platform.as_str())
            .bind(&registration.push_token)
            .bind(&registration.locale)
            .bind(&registration.model)
            .bind(&now)
            .bind(&now)
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!(
                    "Failed to register device for user {}: {}",
                    registration.user_id, e
                );
                DbError::from_query(e)
            })?;

        let device = device_from_row(&row)?;
        info!("Device {} registered for user {}", device.id, device.user_id);
        Ok(device)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Device>, DbError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", DEVICE_COLUMNS, self.table);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(DbError::from_query)?;

        row.as_ref().map(device_from_row).transpose()
    }

    async fn find_latest_active_for_user(&self, user_id: &str) -> Result<Option<Device>, DbError> {
        debug!("Finding latest active device for user: {}", user_id);

        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 AND deleted_at IS NULL \
             AND push_token IS NOT NULL ORDER BY date_updated DESC, id DESC LIMIT 1",
            DEVICE_COLUMNS, self.table
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(DbError::from_query)?;

        row.as_ref().map(device_from_row).transpose()
    }

    async fn find_active_by_user_and_token(
        &self,
        user_id: &str,
        push_token: &str,
    ) -> Result<Option<Device>, DbError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 AND push_token = $2 AND deleted_at IS NULL",
            DEVICE_COLUMNS, self.table
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(push_token)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(DbError::from_query)?;

        row.as_ref().map(device_from_row).transpose()
    }

    async fn update_endpoint_arn(&self, id: i64, endpoint_arn: &str) -> Result<(), DbError> {
        debug!("Storing endpoint for device {}", id);

        let query = format!(
            "UPDATE {} SET sns_platform_endpoint_arn = $1 WHERE id = $2",
            self.table
        );

        let result = sqlx::query(&query)
            .bind(endpoint_arn)
            .bind(id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to store endpoint for device {}: {}", id, e);
                DbError::from_query(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("device {}", id)));
        }
        Ok(())
    }

    async fn invalidate(&self, id: i64) -> Result<DateTime<Utc>, DbError> {
        let now = encode_timestamp(&Utc::now());
        let query = format!(
            "UPDATE {} SET deleted_at = COALESCE(deleted_at, $1) WHERE id = $2 RETURNING deleted_at",
            self.table
        );

        let row = sqlx::query(&query)
            .bind(&now)
            .bind(id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(DbError::from_query)?
            .ok_or_else(|| DbError::NotFound(format!("device {}", id)))?;

        let deleted_at: String = row.try_get("deleted_at")?;
        info!("Device {} invalidated", id);
        decode_timestamp(&deleted_at)
    }

    async fn reset_endpoint(&self, id: i64) -> Result<(), DbError> {
        let query = format!(
            "UPDATE {} SET sns_platform_endpoint_arn = NULL WHERE id = $1",
            self.table
        );

        let result = sqlx::query(&query)
            .bind(id)
            .execute(self.db_client.pool())
            .await
            .map_err(DbError::from_query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("device {}", id)));
        }
        info!("Endpoint of device {} reset", id);
        Ok(())
    }
}
