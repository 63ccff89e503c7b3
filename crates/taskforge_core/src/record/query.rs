//! SELECT/COUNT statement composition.
//!
//! # Responsibility
//! - Assemble projection, joins, compiled conditions, ordering and paging.
//! - Share one `WHERE` compilation between paged reads and totals.
//!
//! # Invariants
//! - On soft-delete entities `<table>.is_deleted = 0` is the first predicate
//!   unless the caller opts out with `with_deleted`.
//! - `LIMIT`/`OFFSET` are always bound as integer parameters.
//! - Every interpolated name passes the identifier whitelist first.

use super::condition::{compile, Condition, ParamMap};
use super::error::{RecordError, RecordResult};
use super::ident::{validate_column, validate_identifier, validate_projection};
use super::policy::{EntityDescriptor, SOFT_DELETE_COLUMN};
use rusqlite::types::Value;

const LIMIT_PARAM: &str = ":page_limit";
const OFFSET_PARAM: &str = ":page_offset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    /// Parses `INNER|LEFT|RIGHT|CROSS`, case-insensitive.
    pub fn parse(token: &str) -> RecordResult<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "INNER" => Ok(Self::Inner),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "CROSS" => Ok(Self::Cross),
            _ => Err(RecordError::InvalidJoinType(token.to_string())),
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// One join clause. `on` pairs two column references compared with `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinType,
    /// Target table, optionally followed by an alias (`users u`).
    pub target: String,
    pub on: Option<(String, String)>,
}

impl Join {
    pub fn new(
        kind: JoinType,
        target: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            on: Some((left.into(), right.into())),
        }
    }

    pub fn cross(target: impl Into<String>) -> Self {
        Self {
            kind: JoinType::Cross,
            target: target.into(),
            on: None,
        }
    }

    fn render(&self) -> RecordResult<String> {
        validate_identifier(&self.target)?;
        match (self.kind, &self.on) {
            (JoinType::Cross, None) => Ok(format!(" CROSS JOIN {}", self.target)),
            (JoinType::Cross, Some(_)) => Err(RecordError::InvalidJoinType(
                "CROSS JOIN with ON clause".to_string(),
            )),
            (kind, Some((left, right))) => {
                validate_column(left)?;
                validate_column(right)?;
                Ok(format!(" {} {} ON {left} = {right}", kind.as_sql(), self.target))
            }
            (kind, None) => Err(RecordError::InvalidJoinType(format!(
                "{} without ON clause",
                kind.as_sql()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parses `ASC|DESC` in any letter case.
    pub fn parse(token: &str) -> RecordResult<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(RecordError::InvalidSortDirection(token.to_string())),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses `"<column> [ASC|DESC]"`.
    pub fn parse(clause: &str) -> RecordResult<Self> {
        let mut parts = clause.split_whitespace();
        let column = parts
            .next()
            .ok_or_else(|| RecordError::InvalidIdentifier(clause.to_string()))?;
        validate_column(column)?;
        let direction = match parts.next() {
            Some(token) => SortDirection::parse(token)?,
            None => SortDirection::Asc,
        };
        if let Some(extra) = parts.next() {
            return Err(RecordError::InvalidSortDirection(extra.to_string()));
        }
        Ok(Self {
            column: column.to_string(),
            direction,
        })
    }
}

/// Declarative description of one read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Projection; empty means `<table>.*`.
    pub select: Vec<String>,
    pub joins: Vec<Join>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Skip the implicit soft-delete predicate.
    pub with_deleted: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets limit and offset from a 1-based page number.
    pub fn paginate(mut self, page: u32, limit: u32) -> RecordResult<Self> {
        if page == 0 || limit == 0 {
            return Err(RecordError::InvalidPagination { page, limit });
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or(RecordError::InvalidPagination { page, limit })?;
        self.limit = Some(limit);
        self.offset = Some(offset);
        Ok(self)
    }

    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }
}

/// SQL text and its named bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: ParamMap,
}

/// Builds the paged SELECT for `options`.
pub fn build_select(entity: &EntityDescriptor, options: &QueryOptions) -> RecordResult<BuiltQuery> {
    validate_column(entity.table)?;
    let projection = if options.select.is_empty() {
        format!("{}.*", entity.table)
    } else {
        for entry in &options.select {
            validate_projection(entry)?;
        }
        options.select.join(", ")
    };

    let joins = render_joins(&options.joins)?;
    let order = render_order(&options.order_by)?;
    let (where_clause, mut params) = render_where(entity, options)?;

    let mut sql = format!("SELECT {projection} FROM {}{joins}{where_clause}{order}", entity.table);

    match (options.limit, options.offset) {
        (Some(0), _) => {
            return Err(RecordError::InvalidPagination { page: 1, limit: 0 });
        }
        (Some(limit), offset) => {
            sql.push_str(&format!(" LIMIT {LIMIT_PARAM}"));
            params.insert(LIMIT_PARAM, Value::Integer(i64::from(limit)))?;
            if let Some(offset) = offset {
                sql.push_str(&format!(" OFFSET {OFFSET_PARAM}"));
                params.insert(OFFSET_PARAM, Value::Integer(i64::from(offset)))?;
            }
        }
        (None, Some(offset)) => {
            sql.push_str(&format!(" LIMIT -1 OFFSET {OFFSET_PARAM}"));
            params.insert(OFFSET_PARAM, Value::Integer(i64::from(offset)))?;
        }
        (None, None) => {}
    }

    Ok(BuiltQuery { sql, params })
}

/// Builds the COUNT matching `options`, ignoring projection, order and paging.
pub fn build_count(entity: &EntityDescriptor, options: &QueryOptions) -> RecordResult<BuiltQuery> {
    validate_column(entity.table)?;
    let joins = render_joins(&options.joins)?;
    let (where_clause, params) = render_where(entity, options)?;
    Ok(BuiltQuery {
        sql: format!("SELECT COUNT(*) FROM {}{joins}{where_clause}", entity.table),
        params,
    })
}

fn render_joins(joins: &[Join]) -> RecordResult<String> {
    let mut rendered = String::new();
    for join in joins {
        rendered.push_str(&join.render()?);
    }
    Ok(rendered)
}

fn render_order(order_by: &[OrderBy]) -> RecordResult<String> {
    if order_by.is_empty() {
        return Ok(String::new());
    }
    let mut terms = Vec::with_capacity(order_by.len());
    for order in order_by {
        validate_column(&order.column)?;
        terms.push(format!("{} {}", order.column, order.direction.as_sql()));
    }
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

fn render_where(
    entity: &EntityDescriptor,
    options: &QueryOptions,
) -> RecordResult<(String, ParamMap)> {
    let compiled = compile(&options.conditions)?;
    let mut predicates = Vec::with_capacity(2);
    if entity.soft_delete && !options.with_deleted {
        predicates.push(format!("{} = 0", entity.qualified(SOFT_DELETE_COLUMN)));
    }
    if !compiled.is_empty() {
        predicates.push(compiled.sql);
    }

    let clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };
    Ok((clause, compiled.params))
}

#[cfg(test)]
mod tests {
    use super::{build_count, build_select, Join, JoinType, OrderBy, QueryOptions, SortDirection};
    use crate::record::{Condition, EntityDescriptor, RecordError};
    use rusqlite::types::Value;

    const PROJECTS: EntityDescriptor = EntityDescriptor::new("Project", "projects")
        .fillable(&["name", "status_id", "owner_id"]);
    const TAGS: EntityDescriptor = EntityDescriptor::new("Tag", "tags").soft_delete(false);

    #[test]
    fn soft_delete_predicate_comes_first() {
        let options = QueryOptions::new().filter(Condition::eq("status_id", 2_i64));
        let built = build_select(&PROJECTS, &options).unwrap();
        assert_eq!(
            built.sql,
            "SELECT projects.* FROM projects WHERE projects.is_deleted = 0 AND status_id = :c0_status_id"
        );
        assert_eq!(built.params.len(), 1);
    }

    #[test]
    fn with_deleted_and_hard_delete_entities_skip_flag() {
        let built = build_select(&PROJECTS, &QueryOptions::new().with_deleted()).unwrap();
        assert_eq!(built.sql, "SELECT projects.* FROM projects");

        let built = build_select(&TAGS, &QueryOptions::new()).unwrap();
        assert_eq!(built.sql, "SELECT tags.* FROM tags");
    }

    #[test]
    fn pagination_binds_limit_and_offset() {
        let options = QueryOptions::new()
            .order_by(OrderBy::desc("id"))
            .paginate(2, 10)
            .unwrap();
        let built = build_select(&PROJECTS, &options).unwrap();

        assert_eq!(
            built.sql,
            "SELECT projects.* FROM projects WHERE projects.is_deleted = 0 ORDER BY id DESC LIMIT :page_limit OFFSET :page_offset"
        );
        assert_eq!(built.params.get(":page_limit"), Some(&Value::Integer(10)));
        assert_eq!(built.params.get(":page_offset"), Some(&Value::Integer(10)));
    }

    #[test]
    fn zero_page_or_limit_is_rejected() {
        assert!(matches!(
            QueryOptions::new().paginate(1, 0),
            Err(RecordError::InvalidPagination { page: 1, limit: 0 })
        ));
        assert!(matches!(
            QueryOptions::new().paginate(0, 10),
            Err(RecordError::InvalidPagination { page: 0, limit: 10 })
        ));
        assert!(matches!(
            build_select(&PROJECTS, &QueryOptions::new().limit(0)),
            Err(RecordError::InvalidPagination { .. })
        ));
    }

    #[test]
    fn offset_without_limit_uses_unbounded_limit() {
        let built = build_select(&TAGS, &QueryOptions::new().offset(5)).unwrap();
        assert_eq!(
            built.sql,
            "SELECT tags.* FROM tags LIMIT -1 OFFSET :page_offset"
        );
    }

    #[test]
    fn joins_render_in_order_and_count_keeps_them() {
        let options = QueryOptions::new()
            .select(&["projects.*", "u.email owner_email"])
            .join(Join::new(JoinType::Left, "users u", "u.id", "projects.owner_id"))
            .join(Join::new(
                JoinType::Inner,
                "companies",
                "companies.id",
                "projects.company_id",
            ))
            .filter(Condition::eq("companies.status", "active".to_string()))
            .order_by(OrderBy::asc("projects.name"))
            .limit(5);

        let select = build_select(&PROJECTS, &options).unwrap();
        assert_eq!(
            select.sql,
            "SELECT projects.*, u.email owner_email FROM projects \
             LEFT JOIN users u ON u.id = projects.owner_id \
             INNER JOIN companies ON companies.id = projects.company_id \
             WHERE projects.is_deleted = 0 AND companies.status = :c0_companies_status \
             ORDER BY projects.name ASC LIMIT :page_limit"
        );

        let count = build_count(&PROJECTS, &options).unwrap();
        assert_eq!(
            count.sql,
            "SELECT COUNT(*) FROM projects \
             LEFT JOIN users u ON u.id = projects.owner_id \
             INNER JOIN companies ON companies.id = projects.company_id \
             WHERE projects.is_deleted = 0 AND companies.status = :c0_companies_status"
        );
        assert_eq!(count.params.len(), 1);
        assert!(count.params.get(":page_limit").is_none());
    }

    #[test]
    fn cross_join_has_no_on_clause() {
        let options = QueryOptions::new().join(Join::cross("roles"));
        let built = build_count(&TAGS, &options).unwrap();
        assert_eq!(built.sql, "SELECT COUNT(*) FROM tags CROSS JOIN roles");
    }

    #[test]
    fn cross_join_with_on_pair_is_rejected() {
        let options = QueryOptions::new().join(Join::new(
            JoinType::Cross,
            "roles",
            "roles.id",
            "tags.id",
        ));
        assert!(matches!(
            build_count(&TAGS, &options),
            Err(RecordError::InvalidJoinType(reason)) if reason == "CROSS JOIN with ON clause"
        ));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let bad_join = QueryOptions::new().join(Join::new(
            JoinType::Inner,
            "users; DROP TABLE users",
            "users.id",
            "projects.owner_id",
        ));
        assert!(matches!(
            build_select(&PROJECTS, &bad_join),
            Err(RecordError::InvalidIdentifier(_))
        ));

        let bad_order = QueryOptions::new().order_by(OrderBy::asc("id DESC, (SELECT 1)"));
        assert!(matches!(
            build_select(&PROJECTS, &bad_order),
            Err(RecordError::InvalidIdentifier(_))
        ));

        let bad_projection = QueryOptions::new().select(&["password_hash FROM users --"]);
        assert!(build_select(&PROJECTS, &bad_projection).is_err());
    }

    #[test]
    fn join_and_sort_tokens_are_enum_checked() {
        assert_eq!(JoinType::parse("left").unwrap(), JoinType::Left);
        assert!(matches!(
            JoinType::parse("OUTER"),
            Err(RecordError::InvalidJoinType(_))
        ));
        assert_eq!(SortDirection::parse("desc").unwrap(), SortDirection::Desc);
        assert!(matches!(
            SortDirection::parse("DESC; DROP"),
            Err(RecordError::InvalidSortDirection(_))
        ));
    }

    #[test]
    fn order_clause_parsing_normalizes_direction() {
        let order = OrderBy::parse("created_at desc").unwrap();
        assert_eq!(order, OrderBy::desc("created_at"));
        assert_eq!(OrderBy::parse("name").unwrap(), OrderBy::asc("name"));
        assert!(OrderBy::parse("name sideways").is_err());
        assert!(OrderBy::parse("name asc extra").is_err());
        assert!(OrderBy::parse("").is_err());
    }
}
