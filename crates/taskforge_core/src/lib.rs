//! Core library for TaskForge record storage.
//! Every entity read and write goes through the `record` layer.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod record;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use record::{
    ListQuery, Paginated, Record, RecordError, RecordRepository, RecordResult,
    SqliteRecordRepository,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
