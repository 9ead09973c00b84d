//! Factory for creating the SQL repositories
//!
//! Table names are taken from the database configuration and validated once, so the
//! repositories handed out afterwards are always bound to usable tables.

use pushwire_config::DatabaseConfig;

use crate::error::DbError;
use crate::repositories::{validate_table_name, SqlDeviceRepository, SqlPushMessageRepository};
use crate::{DbClient, RepositoryFactory};

/// Factory for the SQL device and push message repositories
#[derive(Debug, Clone)]
pub struct SqlRepositoryFactory {
    device_table: String,
    message_table: String,
}

impl SqlRepositoryFactory {
    /// # Errors
    ///
    /// `DbError::ConfigError` if a configured table name is not a plain SQL identifier.
    pub fn new(
        device_table: impl Into<String>,
        message_table: impl Into<String>,
    ) -> Result<Self, DbError> {
        let device_table = device_table.into();
        let message_table = message_table.into();
        validate_table_name(&device_table)?;
        validate_table_name(&message_table)?;
        Ok(Self {
            device_table,
            message_table,
        })
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, DbError> {
        Self::new(&config.device_table, &config.message_table)
    }
}

impl RepositoryFactory<SqlDeviceRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlDeviceRepository {
        SqlDeviceRepository {
            db_client,
            table: self.device_table.clone(),
        }
    }
}

impl RepositoryFactory<SqlPushMessageRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlPushMessageRepository {
        SqlPushMessageRepository {
            db_client,
            table: self.message_table.clone(),
            device_table: self.device_table.clone(),
        }
    }
}
