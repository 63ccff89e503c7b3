//! Transaction coordination over one connection handle.
//!
//! # Invariants
//! - A scope mutably borrows its connection, so no other handle can issue
//!   statements until it is committed or rolled back.
//! - A failed unit of work is rolled back before its error is returned.
//! - Dropping a scope without committing rolls it back.

use super::error::{RecordError, RecordResult, TransactionStage};
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::ops::Deref;

/// Open write transaction. Derefs to the connection repositories borrow.
pub struct TransactionScope<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> TransactionScope<'conn> {
    /// Begins an immediate transaction (takes the write lock up front).
    pub fn begin(conn: &'conn mut Connection) -> RecordResult<Self> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| RecordError::Transaction {
                stage: TransactionStage::Begin,
                source,
            })?;
        debug!("event=tx_begin module=record status=ok");
        Ok(Self { tx })
    }

    /// Connection handle bound to this transaction.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    pub fn commit(self) -> RecordResult<()> {
        self.tx.commit().map_err(|source| RecordError::Transaction {
            stage: TransactionStage::Commit,
            source,
        })?;
        debug!("event=tx_commit module=record status=ok");
        Ok(())
    }

    pub fn rollback(self) -> RecordResult<()> {
        self.tx.rollback().map_err(|source| RecordError::Transaction {
            stage: TransactionStage::Rollback,
            source,
        })?;
        debug!("event=tx_rollback module=record status=ok");
        Ok(())
    }
}

impl Deref for TransactionScope<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

/// Runs `work` inside one transaction.
///
/// Commits when `work` succeeds. When it fails the transaction is rolled
/// back first and the original error is returned; a rollback failure is
/// logged but does not mask that error.
pub fn with_transaction<T, F>(conn: &mut Connection, work: F) -> RecordResult<T>
where
    F: FnOnce(&Connection) -> RecordResult<T>,
{
    let scope = TransactionScope::begin(conn)?;
    match work(scope.connection()) {
        Ok(value) => {
            scope.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = scope.rollback() {
                warn!(
                    "event=tx_rollback module=record status=error {}",
                    rollback_failure_fields(&err, &rollback_err)
                );
            }
            Err(err)
        }
    }
}

/// Log fields for a rollback that failed after `original` was returned by the work.
fn rollback_failure_fields(original: &RecordError, rollback: &RecordError) -> String {
    format!(
        "error_code={} rollback_error_code={}",
        original.code(),
        rollback.code()
    )
}

#[cfg(test)]
mod tests {
    use super::{rollback_failure_fields, with_transaction, TransactionScope};
    use crate::record::{RecordError, TransactionStage};
    use rusqlite::Connection;

    fn scratch() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn failed_work_is_rolled_back() {
        let mut conn = scratch();
        let result: Result<(), RecordError> = with_transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO items (name) VALUES ('a')", [])
                .unwrap();
            Err(RecordError::InvalidData("abort".to_string()))
        });

        assert!(matches!(result, Err(RecordError::InvalidData(_))));
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn successful_work_is_committed() {
        let mut conn = scratch();
        let inserted = with_transaction(&mut conn, |tx| {
            tx.execute("INSERT INTO items (name) VALUES ('a')", [])
                .unwrap();
            Ok(tx.last_insert_rowid())
        })
        .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn explicit_scope_rollback_discards_writes() {
        let mut conn = scratch();
        let scope = TransactionScope::begin(&mut conn).unwrap();
        scope
            .execute("INSERT INTO items (name) VALUES ('a')", [])
            .unwrap();
        scope.rollback().unwrap();
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn rollback_failure_keeps_work_error_as_error_code() {
        let original = RecordError::InvalidData("abort".to_string());
        let rollback = RecordError::Transaction {
            stage: TransactionStage::Rollback,
            source: rusqlite::Error::InvalidQuery,
        };
        assert_eq!(
            rollback_failure_fields(&original, &rollback),
            "error_code=invalid_data rollback_error_code=transaction_failed"
        );
    }
}
