//! Many-to-many link tables.
//!
//! # Responsibility
//! - Replace, upsert, remove and list links between two entities.
//!
//! # Invariants
//! - `replace_links` is all-or-nothing: on any failure the previous link
//!   set is left untouched.
//! - Child ids are de-duplicated before insert.

use super::condition::ParamMap;
use super::error::{RecordError, RecordResult};
use super::ident::{validate_column, validate_field};
use super::transaction::with_transaction;
use super::Record;
use log::debug;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Junction table linking a parent key to a child key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationDescriptor {
    pub name: &'static str,
    pub table: &'static str,
    pub parent_key: &'static str,
    pub child_key: &'static str,
    /// Payload columns updated when an existing link is upserted.
    pub extra_columns: &'static [&'static str],
}

impl AssociationDescriptor {
    pub const fn new(
        name: &'static str,
        table: &'static str,
        parent_key: &'static str,
        child_key: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            parent_key,
            child_key,
            extra_columns: &[],
        }
    }

    pub const fn extra_columns(self, extra_columns: &'static [&'static str]) -> Self {
        Self {
            extra_columns,
            ..self
        }
    }

    pub fn validate(&self) -> RecordResult<()> {
        validate_column(self.table)?;
        validate_field(self.parent_key)?;
        validate_field(self.child_key)?;
        for column in self.extra_columns {
            validate_field(column)?;
        }
        Ok(())
    }

    /// Atomically replaces every link of `parent` with `children`.
    ///
    /// Returns the number of links written.
    pub fn replace_links(
        &self,
        conn: &mut Connection,
        parent: i64,
        children: &[i64],
    ) -> RecordResult<usize> {
        with_transaction(conn, |tx| self.replace_links_in(tx, parent, children))
    }

    /// Delete-then-insert step of [`Self::replace_links`] for callers that
    /// already hold a transaction.
    pub fn replace_links_in(
        &self,
        conn: &Connection,
        parent: i64,
        children: &[i64],
    ) -> RecordResult<usize> {
        self.validate()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", self.table, self.parent_key),
            [parent],
        )
        .map_err(|err| RecordError::persistence(self.name, "unlink", err))?;

        let unique: BTreeSet<i64> = children.iter().copied().collect();
        let insert = format!(
            "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
            self.table, self.parent_key, self.child_key
        );
        for child in &unique {
            conn.execute(&insert, [parent, *child])
                .map_err(|err| RecordError::persistence(self.name, "link", err))?;
        }

        debug!(
            "event=association_replace module=record status=ok association={} rows={}",
            self.name,
            unique.len()
        );
        Ok(unique.len())
    }

    /// Inserts one link, or updates its extra columns when it already exists.
    ///
    /// Keys in `extra` that are not declared extra columns are ignored.
    pub fn upsert_link(
        &self,
        conn: &Connection,
        parent: i64,
        child: i64,
        extra: Record,
    ) -> RecordResult<()> {
        self.validate()?;
        let mut columns = vec![self.parent_key.to_string(), self.child_key.to_string()];
        let mut placeholders = vec![":parent".to_string(), ":child".to_string()];
        let mut updates = Vec::new();
        let mut params = ParamMap::new();
        params.insert(":parent", Value::Integer(parent))?;
        params.insert(":child", Value::Integer(child))?;

        for (column, value) in extra {
            if !self.extra_columns.contains(&column.as_str()) {
                continue;
            }
            let name = format!(":x_{column}");
            updates.push(format!("{column} = excluded.{column}"));
            placeholders.push(name.clone());
            params.insert(name, value)?;
            columns.push(column);
        }

        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}, {}) {conflict}",
            self.table,
            columns.join(", "),
            placeholders.join(", "),
            self.parent_key,
            self.child_key
        );

        let named = params.as_named();
        conn.execute(&sql, named.as_slice())
            .map_err(|err| RecordError::persistence(self.name, "link", err))?;
        Ok(())
    }

    /// Removes one link; returns whether it existed.
    pub fn unlink(&self, conn: &Connection, parent: i64, child: i64) -> RecordResult<bool> {
        self.validate()?;
        let removed = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                    self.table, self.parent_key, self.child_key
                ),
                [parent, child],
            )
            .map_err(|err| RecordError::persistence(self.name, "unlink", err))?;
        Ok(removed > 0)
    }

    /// Child ids linked to `parent`, ascending.
    pub fn linked_ids(&self, conn: &Connection, parent: i64) -> RecordResult<Vec<i64>> {
        self.validate()?;
        let sql = format!(
            "SELECT {child} FROM {} WHERE {} = ?1 ORDER BY {child} ASC",
            self.table,
            self.parent_key,
            child = self.child_key
        );
        let load = || -> rusqlite::Result<Vec<i64>> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([parent], |row| row.get(0))?;
            rows.collect()
        };
        load().map_err(|err| RecordError::persistence(self.name, "list_links", err))
    }
}
