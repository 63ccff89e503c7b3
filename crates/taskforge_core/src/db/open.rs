//! Connection bootstrap.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and the configured busy
//!   timeout.
//! - Returned connections are at the latest schema version.

use super::migrations::apply_migrations;
use super::{BootstrapStage, DbError, DbResult};
use crate::config::StoreConfig;
use crate::logging::sanitize_message;
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};

const MAX_LOGGED_CAUSE_CHARS: usize = 160;

/// Opens a SQLite database file with default settings.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_config(path, &StoreConfig::default())
}

/// Opens a SQLite database file using `config`.
///
/// # Side effects
/// - Emits `db_open` events with duration and status.
pub fn open_db_with_config(path: impl AsRef<Path>, config: &StoreConfig) -> DbResult<Connection> {
    open_with("file", config, || Connection::open(path))
}

/// Opens an in-memory database with the schema applied.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", &StoreConfig::default(), Connection::open_in_memory)
}

fn open_with<F>(mode: &'static str, config: &StoreConfig, connect: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect()
        .map_err(DbError::bootstrap(BootstrapStage::Connect))
        .and_then(|mut conn| {
            bootstrap_connection(&mut conn, config)?;
            Ok(conn)
        });

    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => info!("event=db_open module=db status=ok mode={mode} duration_ms={duration_ms}"),
        Err(err) => {
            let cause = err
                .source()
                .map(|source| sanitize_message(&source.to_string(), MAX_LOGGED_CAUSE_CHARS))
                .unwrap_or_else(|| "none".to_string());
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={duration_ms} error_code={} cause={cause}",
                err.code()
            );
        }
    }
    result
}

fn bootstrap_connection(conn: &mut Connection, config: &StoreConfig) -> DbResult<()> {
    let configure = DbError::bootstrap(BootstrapStage::Configure);
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .and_then(|()| conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms)))
        .map_err(configure)?;
    apply_migrations(conn)
}
