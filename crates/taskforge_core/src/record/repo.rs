//! Record repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the CRUD, lookup, count and paginated listing operations shared
//!   by every entity.
//! - Keep SQL assembly inside the record-access boundary.
//!
//! # Invariants
//! - Writes pass through `for_write`; reads pass through a [`ReadMask`] that
//!   also covers joined entities.
//! - Soft-delete entities never expose flagged rows unless asked to.
//! - A paginated total and its page share one `WHERE` compilation.

use super::condition::{Condition, FilterValue, ParamMap};
use super::error::{RecordError, RecordResult};
use super::ident::{validate_column, validate_field};
use super::policy::{EntityDescriptor, ReadMask, SOFT_DELETE_COLUMN, UPDATED_AT_COLUMN};
use super::query::{build_count, build_select, BuiltQuery, OrderBy, QueryOptions, SortDirection};
use super::{row_to_record, FromRecord, Paginated, Record};
use crate::config::StoreConfig;
use crate::logging::sanitize_message;
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::time::Instant;

const RECORD_ID_PARAM: &str = ":record_id";
const NOW_EPOCH_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";
const MAX_LOGGED_CAUSE_CHARS: usize = 160;

/// Filtered, paginated listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Column → value; scalars compare with `=`, lists with `IN`.
    pub filters: BTreeMap<String, FilterValue>,
    /// Term matched with `LIKE '%term%'` across searchable columns.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u32,
    /// Page size; `None` uses the configured default.
    pub limit: Option<u32>,
    /// Sort column; defaults to the primary key.
    pub order_by: Option<String>,
    /// `ASC` or `DESC` in any letter case; defaults to `ASC`.
    pub order_dir: Option<String>,
    pub with_deleted: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            search: None,
            page: 1,
            limit: None,
            order_by: None,
            order_dir: None,
            with_deleted: false,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn page(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self.order_dir = Some(direction.into());
        self
    }
}

/// Repository interface shared by every entity.
pub trait RecordRepository {
    /// Descriptor this repository serves.
    fn entity(&self) -> &EntityDescriptor;
    /// Inserts one record and returns its new primary key.
    fn create(&self, data: Record) -> RecordResult<i64>;
    /// Updates writable fields; returns whether exactly one row changed.
    ///
    /// An input with no writable fields is a successful no-op.
    fn update(&self, id: i64, data: Record) -> RecordResult<bool>;
    /// Soft- or hard-deletes one record per the entity configuration.
    fn delete(&self, id: i64) -> RecordResult<bool>;
    /// Gets one visible record; `None` when absent.
    fn find(&self, id: i64) -> RecordResult<Option<Record>>;
    /// Lists a page of records with the total across all pages.
    fn get_all(&self, query: &ListQuery) -> RecordResult<Paginated<Record>>;
    /// Counts visible records matching `conditions`.
    fn count(&self, conditions: &[Condition]) -> RecordResult<u64>;

    /// Like [`RecordRepository::find`], but absence is a `NotFound` error.
    fn find_or_fail(&self, id: i64) -> RecordResult<Record> {
        self.find(id)?.ok_or(RecordError::NotFound {
            entity: self.entity().name,
            id,
        })
    }
}

/// SQLite-backed record repository for one entity.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
    entity: EntityDescriptor,
    related: &'static [EntityDescriptor],
    config: StoreConfig,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Constructs a repository after checking the descriptor against the
    /// live schema.
    pub fn try_new(conn: &'conn Connection, entity: &EntityDescriptor) -> RecordResult<Self> {
        entity.validate()?;
        ensure_table_ready(conn, entity)?;
        Ok(Self {
            conn,
            entity: *entity,
            related: &[],
            config: StoreConfig::default(),
        })
    }

    /// Registers descriptors for tables this repository may join, so their
    /// hidden columns are masked in `select` results.
    pub fn with_related(mut self, related: &'static [EntityDescriptor]) -> Self {
        self.related = related;
        self
    }

    /// Replaces listing defaults.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Lists records for arbitrary options, applying read policy.
    pub fn select(&self, options: &QueryOptions) -> RecordResult<Vec<Record>> {
        let started_at = Instant::now();
        let result = build_select(&self.entity, options).and_then(|built| {
            let mask = ReadMask::resolve(&self.entity, self.related, options)?;
            self.fetch(&built, &mask, "select")
        });
        self.observe("select", started_at, result)
    }

    /// Counts rows for arbitrary options (projection, order, paging ignored).
    pub fn count_matching(&self, options: &QueryOptions) -> RecordResult<u64> {
        let started_at = Instant::now();
        let result = build_count(&self.entity, options)
            .and_then(|built| self.fetch_count(&built, "count"));
        self.observe("count", started_at, result)
    }

    /// Gets the first visible record where `column = value`.
    pub fn find_by(&self, column: &str, value: impl Into<Value>) -> RecordResult<Option<Record>> {
        let options = QueryOptions::new()
            .filter(Condition::eq(column, value))
            .order_by(OrderBy::asc(self.entity.qualified(self.entity.primary_key)))
            .limit(1);
        Ok(self.select(&options)?.into_iter().next())
    }

    /// Gets one visible record converted to a typed model.
    pub fn find_as<T: FromRecord>(&self, id: i64) -> RecordResult<Option<T>> {
        self.find(id)?.map(T::from_record).transpose()
    }

    /// Clears the soft-delete flag; returns whether a flagged row was restored.
    pub fn restore(&self, id: i64) -> RecordResult<bool> {
        let started_at = Instant::now();
        let result = if self.entity.soft_delete {
            self.set_deleted_flag(id, false, "restore")
        } else {
            Err(RecordError::Unsupported {
                entity: self.entity.name,
                operation: "restore",
            })
        };
        self.observe("restore", started_at, result)
    }

    /// Physically deletes one row regardless of the soft-delete setting.
    pub fn force_delete(&self, id: i64) -> RecordResult<bool> {
        let started_at = Instant::now();
        let result = self.hard_delete(id, "force_delete");
        self.observe("force_delete", started_at, result)
    }

    fn insert(&self, data: Record) -> RecordResult<i64> {
        let data = self.entity.for_write(data);
        for column in data.keys() {
            validate_field(column)?;
        }

        let mut params = ParamMap::new();
        let sql = if data.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.entity.table)
        } else {
            let mut columns = Vec::with_capacity(data.len());
            let mut placeholders = Vec::with_capacity(data.len());
            for (column, value) in data {
                let name = format!(":v_{column}");
                placeholders.push(name.clone());
                params.insert(name, value)?;
                columns.push(column);
            }
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.entity.table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        self.run(&sql, &params, "create")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn modify(&self, id: i64, data: Record) -> RecordResult<bool> {
        let data = self.entity.for_write(data);
        for column in data.keys() {
            validate_field(column)?;
        }
        if data.is_empty() {
            debug!(
                "event=record_update module=record status=skipped entity={} reason=no_writable_fields",
                self.entity.name
            );
            return Ok(true);
        }

        let stamp_updated_at = self.entity.timestamps && !data.contains_key(UPDATED_AT_COLUMN);
        let mut params = ParamMap::new();
        let mut assignments = Vec::with_capacity(data.len() + 1);
        for (column, value) in data {
            let name = format!(":set_{column}");
            assignments.push(format!("{column} = {name}"));
            params.insert(name, value)?;
        }
        if stamp_updated_at {
            assignments.push(format!("{UPDATED_AT_COLUMN} = {NOW_EPOCH_MS_SQL}"));
        }
        params.insert(RECORD_ID_PARAM, Value::Integer(id))?;

        let mut sql = format!(
            "UPDATE {} SET {} WHERE {} = {RECORD_ID_PARAM}",
            self.entity.table,
            assignments.join(", "),
            self.entity.primary_key
        );
        if self.entity.soft_delete {
            sql.push_str(&format!(" AND {SOFT_DELETE_COLUMN} = 0"));
        }

        Ok(self.run(&sql, &params, "update")? == 1)
    }

    fn set_deleted_flag(&self, id: i64, deleted: bool, action: &'static str) -> RecordResult<bool> {
        let (target, current) = if deleted { (1, 0) } else { (0, 1) };
        let mut assignments = format!("{SOFT_DELETE_COLUMN} = {target}");
        if self.entity.timestamps {
            assignments.push_str(&format!(", {UPDATED_AT_COLUMN} = {NOW_EPOCH_MS_SQL}"));
        }
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = {RECORD_ID_PARAM} AND {SOFT_DELETE_COLUMN} = {current}",
            self.entity.table, self.entity.primary_key
        );
        let mut params = ParamMap::new();
        params.insert(RECORD_ID_PARAM, Value::Integer(id))?;
        Ok(self.run(&sql, &params, action)? == 1)
    }

    fn hard_delete(&self, id: i64, action: &'static str) -> RecordResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = {RECORD_ID_PARAM}",
            self.entity.table, self.entity.primary_key
        );
        let mut params = ParamMap::new();
        params.insert(RECORD_ID_PARAM, Value::Integer(id))?;
        Ok(self.run(&sql, &params, action)? == 1)
    }

    fn lookup(&self, id: i64) -> RecordResult<Option<Record>> {
        let options = QueryOptions::new()
            .filter(Condition::eq(
                self.entity.qualified(self.entity.primary_key),
                id,
            ))
            .limit(1);
        let built = build_select(&self.entity, &options)?;
        Ok(self
            .fetch(&built, &ReadMask::of(&self.entity), "find")?
            .into_iter()
            .next())
    }

    fn list(&self, query: &ListQuery) -> RecordResult<Paginated<Record>> {
        let direction = match query.order_dir.as_deref() {
            Some(token) => SortDirection::parse(token)?,
            None => SortDirection::Asc,
        };
        let order_column = query
            .order_by
            .clone()
            .unwrap_or_else(|| self.entity.primary_key.to_string());
        validate_column(&order_column)?;
        if query.page == 0 {
            return Err(RecordError::InvalidPagination {
                page: 0,
                limit: query.limit.unwrap_or(self.config.default_page_limit),
            });
        }
        let limit = self.config.resolve_limit(query.page, query.limit)?;

        let mut options = QueryOptions::new();
        options.with_deleted = query.with_deleted;
        for (column, value) in &query.filters {
            options = options.filter(Condition::from_parts(column.clone(), None, value.clone())?);
        }
        if let Some(term) = query.search.as_deref().map(str::trim) {
            if !term.is_empty() && !self.entity.searchable.is_empty() {
                let columns = self
                    .entity
                    .searchable
                    .iter()
                    .map(|column| column.to_string())
                    .collect();
                options = options.filter(Condition::Search(columns, term.to_string()));
            }
        }

        options = options.order_by(OrderBy {
            column: order_column.clone(),
            direction,
        });
        let primary_key = self.entity.primary_key;
        if order_column != primary_key && order_column != self.entity.qualified(primary_key) {
            options = options.order_by(OrderBy::asc(primary_key));
        }
        let options = options.paginate(query.page, limit)?;

        let total = self.fetch_count(&build_count(&self.entity, &options)?, "get_all")?;
        let records = self.fetch(
            &build_select(&self.entity, &options)?,
            &ReadMask::of(&self.entity),
            "get_all",
        )?;

        Ok(Paginated {
            total,
            records,
            page: query.page,
            limit,
        })
    }

    fn fetch(
        &self,
        built: &BuiltQuery,
        mask: &ReadMask,
        action: &'static str,
    ) -> RecordResult<Vec<Record>> {
        let rows = self
            .query_rows(built)
            .map_err(|err| RecordError::persistence(self.entity.name, action, err))?;
        Ok(rows.into_iter().map(|row| mask.apply(row)).collect())
    }

    fn query_rows(&self, built: &BuiltQuery) -> rusqlite::Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(&built.sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let named = built.params.as_named();
        let mut rows = stmt.query(named.as_slice())?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(row_to_record(&columns, row)?);
        }
        Ok(records)
    }

    fn fetch_count(&self, built: &BuiltQuery, action: &'static str) -> RecordResult<u64> {
        let named = built.params.as_named();
        let total: i64 = self
            .conn
            .query_row(&built.sql, named.as_slice(), |row| row.get(0))
            .map_err(|err| RecordError::persistence(self.entity.name, action, err))?;
        u64::try_from(total)
            .map_err(|_| RecordError::InvalidData(format!("negative row count {total}")))
    }

    fn run(&self, sql: &str, params: &ParamMap, action: &'static str) -> RecordResult<usize> {
        let named = params.as_named();
        self.conn
            .execute(sql, named.as_slice())
            .map_err(|err| RecordError::persistence(self.entity.name, action, err))
    }

    fn observe<T>(&self, op: &'static str, started_at: Instant, result: RecordResult<T>) -> RecordResult<T> {
        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => debug!(
                "event=record_{op} module=record status=ok entity={} duration_ms={duration_ms}",
                self.entity.name
            ),
            Err(err) if err.is_input_error() || matches!(err, RecordError::NotFound { .. }) => {
                warn!(
                    "event=record_{op} module=record status=rejected entity={} duration_ms={duration_ms} error_code={}",
                    self.entity.name,
                    err.code()
                )
            }
            Err(err) => {
                let cause = err
                    .source()
                    .map(|source| sanitize_message(&source.to_string(), MAX_LOGGED_CAUSE_CHARS))
                    .unwrap_or_else(|| "none".to_string());
                error!(
                    "event=record_{op} module=record status=error entity={} duration_ms={duration_ms} error_code={} cause={cause}",
                    self.entity.name,
                    err.code()
                )
            }
        }
        result
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    fn create(&self, data: Record) -> RecordResult<i64> {
        let started_at = Instant::now();
        let result = self.insert(data);
        self.observe("create", started_at, result)
    }

    fn update(&self, id: i64, data: Record) -> RecordResult<bool> {
        let started_at = Instant::now();
        let result = self.modify(id, data);
        self.observe("update", started_at, result)
    }

    fn delete(&self, id: i64) -> RecordResult<bool> {
        let started_at = Instant::now();
        let result = if self.entity.soft_delete {
            self.set_deleted_flag(id, true, "delete")
        } else {
            self.hard_delete(id, "delete")
        };
        self.observe("delete", started_at, result)
    }

    fn find(&self, id: i64) -> RecordResult<Option<Record>> {
        let started_at = Instant::now();
        let result = self.lookup(id);
        self.observe("find", started_at, result)
    }

    fn get_all(&self, query: &ListQuery) -> RecordResult<Paginated<Record>> {
        let started_at = Instant::now();
        let result = self.list(query);
        self.observe("get_all", started_at, result)
    }

    fn count(&self, conditions: &[Condition]) -> RecordResult<u64> {
        let options = QueryOptions {
            conditions: conditions.to_vec(),
            ..QueryOptions::default()
        };
        self.count_matching(&options)
    }
}

fn ensure_table_ready(conn: &Connection, entity: &EntityDescriptor) -> RecordResult<()> {
    let inspect = |err: rusqlite::Error| RecordError::persistence(entity.name, "inspect", err);

    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [entity.table],
            |row| row.get(0),
        )
        .map_err(inspect)?;
    if exists != 1 {
        return Err(RecordError::MissingRequiredTable(entity.table));
    }

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({});", entity.table))
        .map_err(inspect)?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
        .map_err(inspect)?;

    for column in entity.declared_columns() {
        if !present.iter().any(|name| name == column) {
            return Err(RecordError::MissingRequiredColumn {
                table: entity.table,
                column,
            });
        }
    }
    Ok(())
}
