//! Device and push message storage for pushwire
//!
//! This crate provides a database client built on SQLx's `Any` driver and the repositories
//! the dispatcher works on:
//!
//! - [`DeviceRepository`]: devices, their push tokens and cached broker endpoints
//! - [`PushMessageRepository`]: the append-only audit log of dispatch attempts
//!
//! Both come as SQL and in-memory implementations.
//!
//! # Example
//!
//! ```rust,no_run
//! use pushwire_config::DatabaseConfig;
//! use pushwire_db::{DbClient, DeviceRepository, RepositoryFactory, SqlDeviceRepository, SqlRepositoryFactory};
//!
//! async fn setup_db(config: &DatabaseConfig) -> Result<SqlDeviceRepository, Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_config(config).await?;
//!     let devices: SqlDeviceRepository =
//!         SqlRepositoryFactory::from_config(config)?.create_repository(db_client);
//!     devices.init_schema().await?;
//!     Ok(devices)
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;
pub mod repository;

pub use client::DbClient;
pub use error::DbError;
pub use repository::{DeviceRepository, PushMessageRepository, RepositoryFactory};

pub use repositories::{
    MemoryDeviceRepository, MemoryPushMessageRepository, SqlDeviceRepository,
    SqlPushMessageRepository, SqlRepositoryFactory,
};
