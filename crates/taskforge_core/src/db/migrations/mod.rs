//! Versioned schema scripts.
//!
//! # Invariants
//! - Versions are strictly increasing.
//! - Pending scripts run in one immediate transaction, each followed by
//!   its `PRAGMA user_version` bump. A failing script leaves the database
//!   at the version it had before the batch.

use crate::db::{BootstrapStage, DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "entities",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "associations",
        sql: include_str!("0002_associations.sql"),
    },
];

/// Latest schema version this build knows how to create.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_scripts(conn, MIGRATIONS)
}

fn apply_scripts(conn: &mut Connection, scripts: &[Migration]) -> DbResult<()> {
    let current = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
        .map_err(DbError::bootstrap(BootstrapStage::ReadVersion))?;
    let latest = scripts.last().map_or(0, |migration| migration.version);

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    let pending: Vec<&Migration> = scripts
        .iter()
        .filter(|migration| migration.version > current)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DbError::migration(pending[0].version))?;
    for migration in &pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(DbError::migration(migration.version))?;
        info!(
            "event=db_migrate module=db status=applied version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit().map_err(DbError::migration(latest))?;

    info!("event=db_migrate module=db status=ok from_version={current} to_version={latest}");
    Ok(())
}
