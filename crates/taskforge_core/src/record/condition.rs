//! Structured filter conditions and their compilation to SQL.
//!
//! # Responsibility
//! - Model one predicate per [`Condition`] variant.
//! - Compile a condition list into a parameterized `WHERE` fragment.
//!
//! # Invariants
//! - Values are always bound through named placeholders, never inlined.
//! - Placeholder names are derived from condition index, column and (for
//!   list operators) element index: `:c{index}_{column}[_{element}]`.
//!   Two conditions never produce the same name.
//! - Every column passes [`validate_column`] and every raw parameter name
//!   passes [`validate_field`] before any fragment is built.

use super::error::{RecordError, RecordResult};
use super::ident::{validate_column, validate_field};
use rusqlite::types::{ToSql, Value};
use std::collections::BTreeMap;

/// Comparison operator accepted by [`Condition::from_parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Parses an operator token (case and inner whitespace insensitive).
    pub fn parse(token: &str) -> RecordResult<Self> {
        let normalized = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "=" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            ">=" => Ok(Self::Gte),
            "<=" => Ok(Self::Lte),
            "LIKE" => Ok(Self::Like),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            "IS NULL" => Ok(Self::IsNull),
            "IS NOT NULL" => Ok(Self::IsNotNull),
            _ => Err(RecordError::InvalidOperator(token.to_string())),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

/// Ad-hoc filter value: one scalar or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(Value),
    List(Vec<Value>),
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Value::Integer(value))
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Value::Text(value.to_string()))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Scalar(Value::Text(value))
    }
}

impl From<Vec<Value>> for FilterValue {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(values: Vec<i64>) -> Self {
        Self::List(values.into_iter().map(Value::Integer).collect())
    }
}

/// Raw SQL predicate with its own named parameters.
///
/// The SQL text is trusted caller input; parameter names still pass the
/// identifier whitelist and must not collide with generated placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCondition {
    pub sql: String,
    pub params: Vec<(String, Value)>,
}

impl RawCondition {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Adds one named parameter; a leading `:` is optional.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// One predicate in a filter set. A filter set is combined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Lt(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    Like(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
    /// `LIKE '%term%'` across several columns, combined with `OR`.
    Search(Vec<String>, String),
    Raw(RawCondition),
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In(column.into(), values)
    }

    pub fn raw(raw: RawCondition) -> Self {
        Self::Raw(raw)
    }

    /// Builds a condition from loosely typed parts.
    ///
    /// An absent operator means equality (or `IN` for a list value). An
    /// unrecognized operator token is rejected with `InvalidOperator`.
    /// A scalar `NULL` compared with `=`/`!=` becomes `IS [NOT] NULL`.
    pub fn from_parts(
        column: impl Into<String>,
        operator: Option<&str>,
        value: FilterValue,
    ) -> RecordResult<Self> {
        let column = column.into();
        let operator = match operator {
            Some(token) => Operator::parse(token)?,
            None => Operator::Eq,
        };

        let condition = match (operator, value) {
            (Operator::IsNull, _) => Self::IsNull(column),
            (Operator::IsNotNull, _) => Self::IsNotNull(column),
            (Operator::Eq, FilterValue::Scalar(Value::Null)) => Self::IsNull(column),
            (Operator::Ne, FilterValue::Scalar(Value::Null)) => Self::IsNotNull(column),
            (Operator::Eq | Operator::In, FilterValue::List(values)) => Self::In(column, values),
            (Operator::Ne | Operator::NotIn, FilterValue::List(values)) => {
                Self::NotIn(column, values)
            }
            (Operator::In, FilterValue::Scalar(value)) => Self::In(column, vec![value]),
            (Operator::NotIn, FilterValue::Scalar(value)) => Self::NotIn(column, vec![value]),
            (Operator::Eq, FilterValue::Scalar(value)) => Self::Eq(column, value),
            (Operator::Ne, FilterValue::Scalar(value)) => Self::Ne(column, value),
            (Operator::Gt, FilterValue::Scalar(value)) => Self::Gt(column, value),
            (Operator::Lt, FilterValue::Scalar(value)) => Self::Lt(column, value),
            (Operator::Gte, FilterValue::Scalar(value)) => Self::Gte(column, value),
            (Operator::Lte, FilterValue::Scalar(value)) => Self::Lte(column, value),
            (Operator::Like, FilterValue::Scalar(value)) => Self::Like(column, value),
            (op, FilterValue::List(_)) => {
                return Err(RecordError::InvalidOperator(format!(
                    "{} with list value",
                    op.as_sql()
                )))
            }
        };
        Ok(condition)
    }

    fn validate(&self) -> RecordResult<()> {
        match self {
            Self::Eq(column, _)
            | Self::Ne(column, _)
            | Self::Gt(column, _)
            | Self::Lt(column, _)
            | Self::Gte(column, _)
            | Self::Lte(column, _)
            | Self::Like(column, _)
            | Self::In(column, _)
            | Self::NotIn(column, _)
            | Self::IsNull(column)
            | Self::IsNotNull(column) => validate_column(column),
            Self::Search(columns, _) => columns.iter().try_for_each(|c| validate_column(c)),
            Self::Raw(raw) => raw
                .params
                .iter()
                .try_for_each(|(name, _)| validate_field(name.trim_start_matches(':'))),
        }
    }

    /// Renders this condition; `None` means it contributes no predicate.
    fn render(&self, index: usize, params: &mut ParamMap) -> RecordResult<Option<String>> {
        let fragment = match self {
            Self::Eq(column, value) => compare(column, Operator::Eq, value, index, params)?,
            Self::Ne(column, value) => compare(column, Operator::Ne, value, index, params)?,
            Self::Gt(column, value) => compare(column, Operator::Gt, value, index, params)?,
            Self::Lt(column, value) => compare(column, Operator::Lt, value, index, params)?,
            Self::Gte(column, value) => compare(column, Operator::Gte, value, index, params)?,
            Self::Lte(column, value) => compare(column, Operator::Lte, value, index, params)?,
            Self::Like(column, value) => compare(column, Operator::Like, value, index, params)?,
            Self::In(column, values) => {
                if values.is_empty() {
                    "1 = 0".to_string()
                } else {
                    list(column, Operator::In, values, index, params)?
                }
            }
            Self::NotIn(column, values) => {
                if values.is_empty() {
                    return Ok(None);
                }
                list(column, Operator::NotIn, values, index, params)?
            }
            Self::IsNull(column) => format!("{column} IS NULL"),
            Self::IsNotNull(column) => format!("{column} IS NOT NULL"),
            Self::Search(columns, term) => {
                if columns.is_empty() {
                    return Ok(None);
                }
                let name = format!(":c{index}_search");
                params.insert(name.clone(), Value::Text(format!("%{term}%")))?;
                let alternatives = columns
                    .iter()
                    .map(|column| format!("{column} LIKE {name}"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                format!("({alternatives})")
            }
            Self::Raw(raw) => {
                if raw.sql.trim().is_empty() {
                    return Ok(None);
                }
                for (name, value) in &raw.params {
                    let name = if name.starts_with(':') {
                        name.clone()
                    } else {
                        format!(":{name}")
                    };
                    params.insert(name, value.clone())?;
                }
                format!("({})", raw.sql.trim())
            }
        };
        Ok(Some(fragment))
    }
}

fn placeholder_base(column: &str, index: usize) -> String {
    format!(":c{index}_{}", column.replace('.', "_"))
}

fn compare(
    column: &str,
    op: Operator,
    value: &Value,
    index: usize,
    params: &mut ParamMap,
) -> RecordResult<String> {
    let name = placeholder_base(column, index);
    params.insert(name.clone(), value.clone())?;
    Ok(format!("{column} {} {name}", op.as_sql()))
}

fn list(
    column: &str,
    op: Operator,
    values: &[Value],
    index: usize,
    params: &mut ParamMap,
) -> RecordResult<String> {
    let base = placeholder_base(column, index);
    let mut names = Vec::with_capacity(values.len());
    for (element, value) in values.iter().enumerate() {
        let name = format!("{base}_{element}");
        params.insert(name.clone(), value.clone())?;
        names.push(name);
    }
    Ok(format!("{column} {} ({})", op.as_sql(), names.join(", ")))
}

/// Named parameters keyed by placeholder (including the leading `:`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    values: BTreeMap<String, Value>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one binding; a duplicate name is rejected.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> RecordResult<()> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(RecordError::InvalidIdentifier(name));
        }
        self.values.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrows the bindings in the shape `rusqlite` accepts for named params.
    pub fn as_named(&self) -> Vec<(&str, &dyn ToSql)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect()
    }
}

/// Output of [`compile`]: predicate text without the `WHERE` keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledWhere {
    pub sql: String,
    pub params: ParamMap,
}

impl CompiledWhere {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Predicate text, or the tautology `1=1` when there is none.
    pub fn predicate_or_tautology(&self) -> &str {
        if self.sql.is_empty() {
            "1=1"
        } else {
            &self.sql
        }
    }
}

/// Compiles a filter set into an `AND`-joined predicate and its bindings.
pub fn compile(conditions: &[Condition]) -> RecordResult<CompiledWhere> {
    for condition in conditions {
        condition.validate()?;
    }

    let mut params = ParamMap::new();
    let mut fragments = Vec::with_capacity(conditions.len());
    for (index, condition) in conditions.iter().enumerate() {
        if let Some(fragment) = condition.render(index, &mut params)? {
            fragments.push(fragment);
        }
    }

    Ok(CompiledWhere {
        sql: fragments.join(" AND "),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::{compile, Condition, FilterValue, Operator, RawCondition};
    use crate::record::RecordError;
    use rusqlite::types::Value;

    #[test]
    fn empty_list_compiles_to_empty_fragment() {
        let compiled = compile(&[]).unwrap();
        assert!(compiled.is_empty());
        assert!(compiled.params.is_empty());
        assert_eq!(compiled.sql, "");
        assert_eq!(compiled.predicate_or_tautology(), "1=1");
    }

    #[test]
    fn in_list_generates_one_placeholder_per_element() {
        let condition = Condition::in_list(
            "status",
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        );
        let compiled = compile(&[condition]).unwrap();

        assert_eq!(
            compiled.sql,
            "status IN (:c0_status_0, :c0_status_1, :c0_status_2)"
        );
        assert_eq!(compiled.params.len(), 3);
        assert_eq!(
            compiled.params.get(":c0_status_2"),
            Some(&Value::Integer(3))
        );
    }

    #[test]
    fn same_column_twice_gets_distinct_placeholders() {
        let compiled = compile(&[
            Condition::Gte("due_date".to_string(), Value::Text("2024-01-01".into())),
            Condition::Lt("due_date".to_string(), Value::Text("2024-02-01".into())),
        ])
        .unwrap();

        assert_eq!(
            compiled.sql,
            "due_date >= :c0_due_date AND due_date < :c1_due_date"
        );
        assert_eq!(compiled.params.len(), 2);
    }

    #[test]
    fn null_checks_bind_nothing() {
        let compiled = compile(&[
            Condition::IsNull("deleted_by".to_string()),
            Condition::IsNotNull("tasks.assigned_to".to_string()),
        ])
        .unwrap();
        assert_eq!(
            compiled.sql,
            "deleted_by IS NULL AND tasks.assigned_to IS NOT NULL"
        );
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn qualified_column_placeholder_replaces_dots() {
        let compiled = compile(&[Condition::eq("projects.company_id", 4_i64)]).unwrap();
        assert_eq!(compiled.sql, "projects.company_id = :c0_projects_company_id");
    }

    #[test]
    fn empty_in_matches_nothing_and_empty_not_in_is_skipped() {
        let compiled = compile(&[
            Condition::In("id".to_string(), Vec::new()),
            Condition::NotIn("id".to_string(), Vec::new()),
        ])
        .unwrap();
        assert_eq!(compiled.sql, "1 = 0");
    }

    #[test]
    fn search_binds_one_wrapped_pattern() {
        let compiled = compile(&[Condition::Search(
            vec!["name".to_string(), "description".to_string()],
            "alpha".to_string(),
        )])
        .unwrap();
        assert_eq!(
            compiled.sql,
            "(name LIKE :c0_search OR description LIKE :c0_search)"
        );
        assert_eq!(
            compiled.params.get(":c0_search"),
            Some(&Value::Text("%alpha%".to_string()))
        );
    }

    #[test]
    fn raw_condition_is_parenthesized_with_its_params() {
        let raw = RawCondition::new("start_date <= :window_end OR end_date IS NULL")
            .bind("window_end", "2024-06-30".to_string());
        let compiled = compile(&[Condition::eq("status_id", 2_i64), Condition::raw(raw)]).unwrap();

        assert_eq!(
            compiled.sql,
            "status_id = :c0_status_id AND (start_date <= :window_end OR end_date IS NULL)"
        );
        assert!(compiled.params.get(":window_end").is_some());
    }

    #[test]
    fn raw_param_collision_is_rejected() {
        let raw = RawCondition::new("id = :c0_id").bind(":c0_id", 1_i64);
        let err = compile(&[Condition::eq("id", 5_i64), Condition::raw(raw)]).unwrap_err();
        assert!(matches!(err, RecordError::InvalidIdentifier(name) if name == ":c0_id"));
    }

    #[test]
    fn raw_param_names_must_be_plain_fields() {
        let raw = RawCondition::new("owner_id = :a.b").bind("a.b", 1_i64);
        let err = compile(&[Condition::raw(raw)]).unwrap_err();
        assert!(matches!(err, RecordError::InvalidIdentifier(name) if name == "a.b"));
    }

    #[test]
    fn invalid_column_is_rejected_before_rendering() {
        let err = compile(&[
            Condition::eq("name", "ok".to_string()),
            Condition::eq("name = 1 OR 1", 1_i64),
        ])
        .unwrap_err();
        assert!(matches!(err, RecordError::InvalidIdentifier(_)));
    }

    #[test]
    fn operator_parsing_is_case_and_space_insensitive() {
        assert_eq!(Operator::parse("not   in").unwrap(), Operator::NotIn);
        assert_eq!(Operator::parse("is not null").unwrap(), Operator::IsNotNull);
        assert_eq!(Operator::parse("<>").unwrap(), Operator::Ne);
        assert!(matches!(
            Operator::parse("=="),
            Err(RecordError::InvalidOperator(token)) if token == "=="
        ));
    }

    #[test]
    fn from_parts_defaults_to_equality_and_in() {
        assert_eq!(
            Condition::from_parts("status_id", None, FilterValue::from(2_i64)).unwrap(),
            Condition::Eq("status_id".to_string(), Value::Integer(2))
        );
        assert_eq!(
            Condition::from_parts("status_id", None, FilterValue::from(vec![1_i64, 2])).unwrap(),
            Condition::In(
                "status_id".to_string(),
                vec![Value::Integer(1), Value::Integer(2)]
            )
        );
        assert_eq!(
            Condition::from_parts("owner_id", Some("="), FilterValue::Scalar(Value::Null))
                .unwrap(),
            Condition::IsNull("owner_id".to_string())
        );
    }

    #[test]
    fn from_parts_rejects_unknown_operator_and_list_comparisons() {
        assert!(matches!(
            Condition::from_parts("id", Some("BETWEEN"), FilterValue::from(1_i64)),
            Err(RecordError::InvalidOperator(_))
        ));
        assert!(matches!(
            Condition::from_parts("id", Some(">"), FilterValue::from(vec![1_i64])),
            Err(RecordError::InvalidOperator(_))
        ));
    }
}
