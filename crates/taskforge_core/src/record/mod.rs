//! Generic relational record-access layer.
//!
//! # Responsibility
//! - Turn declarative filters into parameterized SQL.
//! - Apply field policy and soft delete uniformly for every entity.
//! - Provide CRUD, counting, pagination and transactional association writes.
//!
//! # Invariants
//! - Identifiers are whitelisted before they reach SQL text.
//! - Values are only ever bound as named parameters.
//! - Hidden columns never leave this module.
//!
//! Data flows one way: options → [`compile`]/[`build_select`] → driver →
//! [`ReadMask`] → caller.

pub mod association;
pub mod condition;
pub mod error;
pub mod ident;
pub mod policy;
pub mod query;
pub mod repo;
pub mod transaction;

pub use association::AssociationDescriptor;
pub use condition::{
    compile, CompiledWhere, Condition, FilterValue, Operator, ParamMap, RawCondition,
};
pub use error::{PersistenceKind, RecordError, RecordResult, TransactionStage};
pub use ident::{validate_column, validate_identifier};
pub use policy::{EntityDescriptor, ReadMask, WritePolicy};
pub use query::{
    build_count, build_select, BuiltQuery, Join, JoinType, OrderBy, QueryOptions, SortDirection,
};
pub use repo::{ListQuery, RecordRepository, SqliteRecordRepository};
pub use transaction::{with_transaction, TransactionScope};

use rusqlite::types::Value;
use rusqlite::Row;
use std::collections::BTreeMap;

/// Column name → value map; the untyped shape of one row.
pub type Record = BTreeMap<String, Value>;

/// Builds a [`Record`] from `(column, value)` pairs.
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(column, value)| (column.into(), value.into()))
        .collect()
}

/// Converts a policy-filtered [`Record`] into a typed model.
pub trait FromRecord: Sized {
    fn from_record(record: Record) -> RecordResult<Self>;
}

/// `{ total, records }` envelope returned by paginated reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    /// Matching rows across all pages at the time of the count.
    pub total: u64,
    pub records: Vec<T>,
    /// 1-based page that was read.
    pub page: u32,
    /// Page size actually applied.
    pub limit: u32,
}

impl<T> Paginated<T> {
    /// Number of pages needed to enumerate `total` rows.
    pub fn page_count(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.page) < self.page_count()
    }

    /// Converts every record, failing on the first conversion error.
    pub fn try_map<U, F>(self, convert: F) -> RecordResult<Paginated<U>>
    where
        F: FnMut(T) -> RecordResult<U>,
    {
        let records = self
            .records
            .into_iter()
            .map(convert)
            .collect::<RecordResult<Vec<U>>>()?;
        Ok(Paginated {
            total: self.total,
            records,
            page: self.page,
            limit: self.limit,
        })
    }
}

pub(crate) fn row_to_record(columns: &[String], row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (index, column) in columns.iter().enumerate() {
        let value: Value = row.get(index)?;
        record.insert(column.clone(), value);
    }
    Ok(record)
}

/// Reads a required integer column.
pub fn get_i64(record: &Record, column: &str) -> RecordResult<i64> {
    match record.get(column) {
        Some(Value::Integer(value)) => Ok(*value),
        other => Err(unexpected(column, "integer", other)),
    }
}

/// Reads a nullable integer column.
pub fn get_opt_i64(record: &Record, column: &str) -> RecordResult<Option<i64>> {
    match record.get(column) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::Integer(value)) => Ok(Some(*value)),
        other => Err(unexpected(column, "integer", other)),
    }
}

/// Reads a required text column.
pub fn get_text(record: &Record, column: &str) -> RecordResult<String> {
    match record.get(column) {
        Some(Value::Text(value)) => Ok(value.clone()),
        other => Err(unexpected(column, "text", other)),
    }
}

/// Reads a nullable text column.
pub fn get_opt_text(record: &Record, column: &str) -> RecordResult<Option<String>> {
    match record.get(column) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::Text(value)) => Ok(Some(value.clone())),
        other => Err(unexpected(column, "text", other)),
    }
}

/// Reads a nullable real column; integers are widened.
pub fn get_opt_f64(record: &Record, column: &str) -> RecordResult<Option<f64>> {
    match record.get(column) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::Real(value)) => Ok(Some(*value)),
        Some(Value::Integer(value)) => Ok(Some(*value as f64)),
        other => Err(unexpected(column, "real", other)),
    }
}

fn unexpected(column: &str, expected: &str, found: Option<&Value>) -> RecordError {
    let found = match found {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Integer(_)) => "integer",
        Some(Value::Real(_)) => "real",
        Some(Value::Text(_)) => "text",
        Some(Value::Blob(_)) => "blob",
    };
    RecordError::InvalidData(format!("column `{column}` expected {expected}, found {found}"))
}
