//! SQLite bootstrap for the record layer.
//!
//! # Responsibility
//! - Open connections with foreign keys and the busy timeout applied.
//! - Bring the schema to the latest version before a connection is returned.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - `Display` names the failed step and its failure class only. Driver
//!   text stays reachable through `source()`.

use crate::record::PersistenceKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_db_with_config};

pub type DbResult<T> = Result<T, DbError>;

/// Connection setup step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Connect,
    Configure,
    ReadVersion,
}

impl Display for BootstrapStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Configure => "configure",
            Self::ReadVersion => "schema version read",
        })
    }
}

/// Failure while opening or preparing a database.
#[derive(Debug)]
pub enum DbError {
    Bootstrap {
        stage: BootstrapStage,
        kind: PersistenceKind,
        source: rusqlite::Error,
    },
    /// A schema script (or its transaction) failed. Nothing from the
    /// pending batch was kept.
    Migration {
        version: u32,
        kind: PersistenceKind,
        source: rusqlite::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    pub(crate) fn bootstrap(stage: BootstrapStage) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Bootstrap {
            stage,
            kind: PersistenceKind::classify(&source),
            source,
        }
    }

    pub(crate) fn migration(version: u32) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Migration {
            version,
            kind: PersistenceKind::classify(&source),
            source,
        }
    }

    /// Stable machine-readable code, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bootstrap {
                stage: BootstrapStage::Connect,
                ..
            } => "db_open_failed",
            Self::Bootstrap { .. } => "db_bootstrap_failed",
            Self::Migration { .. } => "db_migration_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bootstrap { stage, kind, .. } => {
                write!(f, "database {stage} failed: {}", kind.as_str())
            }
            Self::Migration { version, kind, .. } => write!(
                f,
                "failed to apply schema version {version}: {}",
                kind.as_str()
            ),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bootstrap { source, .. } | Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}
