//! Entity descriptors and field-level read/write policy.
//!
//! # Responsibility
//! - Describe one record type: table, primary key, field sets, soft delete.
//! - Filter caller input before writes and persisted rows before reads.
//!
//! # Invariants
//! - Guarded and fillable sets are disjoint.
//! - The primary key and the soft-delete flag are never writable.
//! - Hidden columns are removed from every record returned to callers.

use super::error::{RecordError, RecordResult};
use super::ident::validate_column;
use super::query::QueryOptions;
use super::Record;

/// Column holding the soft-delete flag on soft-delete tables.
pub const SOFT_DELETE_COLUMN: &str = "is_deleted";
/// Audit column stamped on update when timestamps are enabled.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

const DEFAULT_GUARDED: &[&str] = &["id", "created_at", "updated_at", "is_deleted"];

/// How `for_write` decides which input keys survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Keep every key except guarded ones.
    GuardedSubtraction,
    /// Keep only keys listed as fillable.
    FillableOnly,
}

/// Static metadata for one record type.
///
/// Descriptors are built in `const` context and never change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Human-readable entity name used in errors and logs.
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub fillable: &'static [&'static str],
    pub guarded: &'static [&'static str],
    pub hidden: &'static [&'static str],
    pub searchable: &'static [&'static str],
    pub soft_delete: bool,
    pub timestamps: bool,
    pub write_policy: WritePolicy,
}

impl EntityDescriptor {
    /// Creates a soft-delete, timestamped descriptor with default guarded set.
    pub const fn new(name: &'static str, table: &'static str) -> Self {
        Self {
            name,
            table,
            primary_key: "id",
            fillable: &[],
            guarded: DEFAULT_GUARDED,
            hidden: &[],
            searchable: &[],
            soft_delete: true,
            timestamps: true,
            write_policy: WritePolicy::GuardedSubtraction,
        }
    }

    pub const fn primary_key(self, primary_key: &'static str) -> Self {
        Self {
            primary_key,
            ..self
        }
    }

    pub const fn fillable(self, fillable: &'static [&'static str]) -> Self {
        Self { fillable, ..self }
    }

    pub const fn guarded(self, guarded: &'static [&'static str]) -> Self {
        Self { guarded, ..self }
    }

    pub const fn hidden(self, hidden: &'static [&'static str]) -> Self {
        Self { hidden, ..self }
    }

    pub const fn searchable(self, searchable: &'static [&'static str]) -> Self {
        Self { searchable, ..self }
    }

    pub const fn soft_delete(self, soft_delete: bool) -> Self {
        Self {
            soft_delete,
            ..self
        }
    }

    pub const fn timestamps(self, timestamps: bool) -> Self {
        Self { timestamps, ..self }
    }

    pub const fn write_policy(self, write_policy: WritePolicy) -> Self {
        Self {
            write_policy,
            ..self
        }
    }

    /// `<table>.<column>` reference for this entity.
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{column}", self.table)
    }

    /// Every column this descriptor names, in declaration order.
    pub fn declared_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![self.primary_key];
        for column in self
            .fillable
            .iter()
            .chain(self.guarded)
            .chain(self.hidden)
            .chain(self.searchable)
        {
            if !columns.contains(column) {
                columns.push(*column);
            }
        }
        if self.soft_delete && !columns.contains(&SOFT_DELETE_COLUMN) {
            columns.push(SOFT_DELETE_COLUMN);
        }
        if self.timestamps && !columns.contains(&UPDATED_AT_COLUMN) {
            columns.push(UPDATED_AT_COLUMN);
        }
        columns
    }

    /// Checks descriptor-internal invariants.
    pub fn validate(&self) -> RecordResult<()> {
        validate_column(self.table).map_err(|_| self.invalid(format!(
            "table name `{}` is not a valid identifier",
            self.table
        )))?;
        for column in self.declared_columns() {
            validate_column(column).map_err(|_| {
                self.invalid(format!("column `{column}` is not a valid identifier"))
            })?;
        }
        if let Some(overlap) = self.fillable.iter().find(|c| self.guarded.contains(*c)) {
            return Err(self.invalid(format!(
                "column `{overlap}` is both fillable and guarded"
            )));
        }
        if self.fillable.contains(&self.primary_key) {
            return Err(self.invalid(format!(
                "primary key `{}` cannot be fillable",
                self.primary_key
            )));
        }
        if self.write_policy == WritePolicy::FillableOnly && self.fillable.is_empty() {
            return Err(self.invalid("fillable-only policy needs fillable columns".to_string()));
        }
        Ok(())
    }

    fn invalid(&self, message: String) -> RecordError {
        RecordError::InvalidDescriptor {
            entity: self.name,
            message,
        }
    }

    /// Returns true when `column` may never be written through `for_write`.
    pub fn is_guarded(&self, column: &str) -> bool {
        column == self.primary_key
            || (self.soft_delete && column == SOFT_DELETE_COLUMN)
            || self.guarded.contains(&column)
    }

    /// Filters caller input down to writable columns.
    pub fn for_write(&self, mut input: Record) -> Record {
        input.retain(|column, _| {
            if self.is_guarded(column) {
                return false;
            }
            match self.write_policy {
                WritePolicy::GuardedSubtraction => true,
                WritePolicy::FillableOnly => self.fillable.contains(&column.as_str()),
            }
        });
        input
    }

    /// Removes hidden columns from a persisted row.
    pub fn for_read(&self, row: Record) -> Record {
        ReadMask::of(self).apply(row)
    }
}

/// Hidden columns in effect for one read: the entity's own plus those of
/// every joined table whose descriptor is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadMask {
    hidden: Vec<&'static str>,
}

impl ReadMask {
    /// Mask for a read that touches only `entity`.
    pub fn of(entity: &EntityDescriptor) -> Self {
        Self {
            hidden: entity.hidden.to_vec(),
        }
    }

    /// Resolves the mask for `entity` joined as `options` describes.
    ///
    /// Join targets are looked up in `related` by table name. A projection
    /// entry naming a hidden column is rejected. `*` and `<table>.*` are
    /// rejected over joined tables without a descriptor, since their hidden
    /// set is unknown.
    pub fn resolve(
        entity: &EntityDescriptor,
        related: &[EntityDescriptor],
        options: &QueryOptions,
    ) -> RecordResult<Self> {
        let mut scopes: Vec<(&str, Option<&EntityDescriptor>)> = vec![(entity.table, Some(entity))];
        for join in &options.joins {
            let mut parts = join.target.split_whitespace();
            let Some(table) = parts.next() else {
                continue;
            };
            let descriptor = if table == entity.table {
                Some(entity)
            } else {
                related.iter().find(|candidate| candidate.table == table)
            };
            scopes.push((table, descriptor));
            if let Some(alias) = parts.next() {
                scopes.push((alias, descriptor));
            }
        }

        let mut mask = Self::default();
        for (_, descriptor) in &scopes {
            if let Some(descriptor) = descriptor {
                for column in descriptor.hidden {
                    if !mask.hidden.contains(column) {
                        mask.hidden.push(*column);
                    }
                }
            }
        }

        let scope_of = |qualifier: &str| {
            scopes
                .iter()
                .find(|(name, _)| *name == qualifier)
                .map(|(_, descriptor)| *descriptor)
        };
        for entry in &options.select {
            let rejected = if entry == "*" {
                scopes.iter().any(|(_, descriptor)| descriptor.is_none())
            } else if let Some(qualifier) = entry.strip_suffix(".*") {
                matches!(scope_of(qualifier), Some(None))
            } else {
                let expression = entry.split_whitespace().next().unwrap_or_default();
                match expression.rsplit_once('.') {
                    Some((qualifier, column)) => matches!(
                        scope_of(qualifier),
                        Some(Some(descriptor)) if descriptor.hidden.contains(&column)
                    ),
                    None => mask.hidden.contains(&expression),
                }
            };
            if rejected {
                return Err(RecordError::InvalidIdentifier(entry.clone()));
            }
        }
        Ok(mask)
    }

    pub fn apply(&self, mut row: Record) -> Record {
        row.retain(|column, _| !self.hidden.contains(&column.as_str()));
        row
    }
}
