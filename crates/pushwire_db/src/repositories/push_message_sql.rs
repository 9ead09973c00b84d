//! SQL implementation of the push message audit log

use chrono::Utc;
use pushwire_common::models::{NewPushMessage, PushMessage};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error};

use crate::error::DbError;
use crate::repositories::{decode_timestamp, encode_timestamp, try_get_nullable, validate_table_name};
use crate::repository::PushMessageRepository;
use crate::DbClient;

const MESSAGE_COLUMNS: &str =
    "id, device_id, body, data, sns_message_id, sns_response, date_created, date_updated";

/// SQL implementation of the push message repository
#[derive(Debug, Clone)]
pub struct SqlPushMessageRepository {
    pub(crate) db_client: DbClient,
    pub(crate) table: String,
    pub(crate) device_table: String,
}

impl SqlPushMessageRepository {
    /// Create a new repository writing to `table`, whose rows reference `device_table`
    pub fn new(
        db_client: DbClient,
        table: impl Into<String>,
        device_table: impl Into<String>,
    ) -> Result<Self, DbError> {
        let table = table.into();
        let device_table = device_table.into();
        validate_table_name(&table)?;
        validate_table_name(&device_table)?;
        Ok(Self {
            db_client,
            table,
            device_table,
        })
    }
}

fn message_from_row(row: &AnyRow) -> Result<PushMessage, DbError> {
    let date_created: String = row.try_get("date_created")?;
    let date_updated: String = row.try_get("date_updated")?;

    Ok(PushMessage {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        body: row.try_get("body")?,
        data: row.try_get("data")?,
        sns_message_id: try_get_nullable(row, "sns_message_id")?,
        sns_response: row.try_get("sns_response")?,
        date_created: decode_timestamp(&date_created)?,
        date_updated: decode_timestamp(&date_updated)?,
    })
}

impl PushMessageRepository for SqlPushMessageRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing push message schema in table {}", self.table);

        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL REFERENCES {device_table}(id),
                body TEXT NOT NULL DEFAULT '',
                data TEXT NOT NULL,
                sns_message_id TEXT UNIQUE,
                sns_response TEXT NOT NULL,
                date_created TEXT NOT NULL,
                date_updated TEXT NOT NULL
            )
            "#,
            table = self.table,
            device_table = self.device_table
        );
        self.db_client.execute(&query).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_device_id_idx ON {table} (device_id)",
            table = self.table
        );
        self.db_client.execute(&index).await?;
        Ok(())
    }

    async fn create(&self, message: NewPushMessage) -> Result<PushMessage, DbError> {
        debug!("Recording push message for device {}", message.device_id);

        let now = encode_timestamp(&Utc::now());
        let query = format!(
            "INSERT INTO {} (device_id, body, data, sns_message_id, sns_response, \
             date_created, date_updated) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            self.table, MESSAGE_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(message.device_id)
            .bind(&message.body)
            .bind(&message.data)
            .bind(message.sns_message_id.clone())
            .bind(&message.sns_response)
            .bind(&now)
            .bind(&now)
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!(
                    "Failed to record push message for device {}: {}",
                    message.device_id, e
                );
                DbError::from_query(e)
            })?;

        message_from_row(&row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PushMessage>, DbError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", MESSAGE_COLUMNS, self.table);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(DbError::from_query)?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn find_by_device(&self, device_id: i64) -> Result<Vec<PushMessage>, DbError> {
        let query = format!(
            "SELECT {} FROM {} WHERE device_id = $1 ORDER BY id",
            MESSAGE_COLUMNS, self.table
        );

        let rows = sqlx::query(&query)
            .bind(device_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(DbError::from_query)?;

        rows.iter().map(message_from_row).collect()
    }
}
