//! Record-access error taxonomy.
//!
//! # Invariants
//! - Input-shape errors are raised before any SQL text is assembled.
//! - `Display` output never contains driver messages or SQL text; the
//!   underlying driver error is only reachable through `Error::source`.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RecordResult<T> = Result<T, RecordError>;

/// Coarse classification of a driver failure that is safe to show callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceKind {
    /// Unique, foreign key, check or not-null constraint rejected the write.
    Constraint,
    /// Database was locked or busy beyond the configured timeout.
    Busy,
    Other,
}

impl PersistenceKind {
    pub fn classify(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(inner, _) => match inner.code {
                ErrorCode::ConstraintViolation => Self::Constraint,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Self::Busy,
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Constraint => "constraint violation",
            Self::Busy => "database busy",
            Self::Other => "storage failure",
        }
    }
}

/// Transaction step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    Begin,
    Commit,
    Rollback,
}

impl Display for TransactionStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        };
        f.write_str(stage)
    }
}

/// Error returned by every record-access operation.
#[derive(Debug)]
pub enum RecordError {
    /// Table, column or alias name outside the allowed character class.
    InvalidIdentifier(String),
    /// Comparison operator token outside the supported set.
    InvalidOperator(String),
    /// Join type token outside `INNER|LEFT|RIGHT|CROSS`.
    InvalidJoinType(String),
    /// Sort direction other than `ASC|DESC`.
    InvalidSortDirection(String),
    /// Page number or page size below 1.
    InvalidPagination { page: u32, limit: u32 },
    /// Entity descriptor violates its own field policy invariants.
    InvalidDescriptor {
        entity: &'static str,
        message: String,
    },
    /// Record with the given primary key is absent or soft-deleted.
    NotFound { entity: &'static str, id: i64 },
    /// Descriptor table does not exist on the connection.
    MissingRequiredTable(&'static str),
    /// Descriptor column does not exist on its table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Operation is not available for this entity configuration.
    Unsupported {
        entity: &'static str,
        operation: &'static str,
    },
    /// Persisted row cannot be converted to the requested typed record.
    InvalidData(String),
    /// Driver rejected a statement.
    Persistence {
        entity: &'static str,
        action: &'static str,
        kind: PersistenceKind,
        source: rusqlite::Error,
    },
    /// Driver rejected a transaction control statement.
    Transaction {
        stage: TransactionStage,
        source: rusqlite::Error,
    },
}

impl RecordError {
    /// Wraps a driver error raised while running `action` against `entity`.
    pub fn persistence(entity: &'static str, action: &'static str, source: rusqlite::Error) -> Self {
        Self::Persistence {
            entity,
            action,
            kind: PersistenceKind::classify(&source),
            source,
        }
    }

    /// Stable machine-readable code, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::InvalidOperator(_) => "invalid_operator",
            Self::InvalidJoinType(_) => "invalid_join_type",
            Self::InvalidSortDirection(_) => "invalid_sort_direction",
            Self::InvalidPagination { .. } => "invalid_pagination",
            Self::InvalidDescriptor { .. } => "invalid_descriptor",
            Self::NotFound { .. } => "not_found",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
            Self::Unsupported { .. } => "unsupported",
            Self::InvalidData(_) => "invalid_data",
            Self::Persistence { .. } => "persistence_failed",
            Self::Transaction { .. } => "transaction_failed",
        }
    }

    /// Returns true for caller/input errors detected before any SQL ran.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_)
                | Self::InvalidOperator(_)
                | Self::InvalidJoinType(_)
                | Self::InvalidSortDirection(_)
                | Self::InvalidPagination { .. }
        )
    }
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(value) => write!(f, "invalid identifier `{value}`"),
            Self::InvalidOperator(value) => write!(f, "invalid operator `{value}`"),
            Self::InvalidJoinType(value) => write!(f, "invalid join type `{value}`"),
            Self::InvalidSortDirection(value) => {
                write!(f, "invalid sort direction `{value}`; expected ASC|DESC")
            }
            Self::InvalidPagination { page, limit } => write!(
                f,
                "invalid pagination page={page} limit={limit}; page must be at least 1 and limit within the configured maximum"
            ),
            Self::InvalidDescriptor { entity, message } => {
                write!(f, "invalid descriptor for {entity}: {message}")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "record repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "record repository requires column `{column}` in table `{table}`"
            ),
            Self::Unsupported { entity, operation } => {
                write!(f, "{operation} is not supported for {entity}")
            }
            Self::InvalidData(message) => write!(f, "invalid record data: {message}"),
            Self::Persistence {
                entity,
                action,
                kind,
                ..
            } => write!(f, "failed to {action} {entity} record: {}", kind.as_str()),
            Self::Transaction { stage, .. } => write!(f, "transaction {stage} failed"),
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence { source, .. } => Some(source),
            Self::Transaction { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PersistenceKind, RecordError, TransactionStage};

    #[test]
    fn persistence_display_hides_driver_text() {
        let driver = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed: users.email".to_string()),
        );
        let err = RecordError::persistence("User", "create", driver);

        let message = err.to_string();
        assert_eq!(message, "failed to create User record: constraint violation");
        assert!(!message.contains("users.email"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(matches!(
            err,
            RecordError::Persistence {
                kind: PersistenceKind::Constraint,
                ..
            }
        ));
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(RecordError::InvalidIdentifier("a;b".to_string()).is_input_error());
        assert!(RecordError::InvalidPagination { page: 1, limit: 0 }.is_input_error());
        assert!(!RecordError::NotFound {
            entity: "Project",
            id: 7
        }
        .is_input_error());
    }

    #[test]
    fn transaction_display_names_stage_only() {
        let err = RecordError::Transaction {
            stage: TransactionStage::Commit,
            source: rusqlite::Error::ExecuteReturnedResults,
        };
        assert_eq!(err.to_string(), "transaction commit failed");
        assert_eq!(err.code(), "transaction_failed");
    }
}
