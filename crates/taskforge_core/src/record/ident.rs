//! Identifier whitelisting for table, column and alias names.
//!
//! # Responsibility
//! - Gate every name that is interpolated into SQL text.
//!
//! # Invariants
//! - Accepted names only contain `[A-Za-z0-9_]`, `.` separators between
//!   segments, and at most one internal space before a trailing alias.
//! - Validation happens before any string concatenation.

use super::error::{RecordError, RecordResult};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 128;

static COLUMN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*$").expect("valid column regex")
});
static ALIASED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*(?: [A-Za-z0-9_]+)?$")
        .expect("valid aliased identifier regex")
});

/// Validates a table or column reference, optionally qualified (`table.column`).
pub fn validate_column(identifier: &str) -> RecordResult<()> {
    check(identifier, &COLUMN_RE)
}

/// Validates an unqualified column name used as an INSERT/UPDATE target.
pub fn validate_field(name: &str) -> RecordResult<()> {
    validate_column(name)?;
    if name.contains('.') {
        return Err(RecordError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Validates a name that may carry a trailing alias (`projects p`).
pub fn validate_identifier(identifier: &str) -> RecordResult<()> {
    check(identifier, &ALIASED_RE)
}

/// Validates a projection entry: `*`, `table.*`, or an aliased identifier.
pub fn validate_projection(entry: &str) -> RecordResult<()> {
    if entry == "*" {
        return Ok(());
    }
    if let Some(table) = entry.strip_suffix(".*") {
        return validate_column(table);
    }
    validate_identifier(entry)
}

fn check(identifier: &str, pattern: &Regex) -> RecordResult<()> {
    if identifier.len() > MAX_IDENTIFIER_LEN || !pattern.is_match(identifier) {
        return Err(RecordError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(())
}
