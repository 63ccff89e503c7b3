//! Project membership.

use super::ServiceResult;
use crate::model::{repository, User, PROJECTS, PROJECT_MEMBERS, USERS};
use crate::record::{
    record, Condition, FromRecord, Join, JoinType, OrderBy, QueryOptions, RecordRepository,
    SqliteRecordRepository,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::Connection;

/// One member of a project with their project-level role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMember {
    pub user: User,
    pub role_id: Option<i64>,
}

pub struct ProjectService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ProjectService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Adds `user_id` to `project_id`, or changes their project role when
    /// they are already a member.
    pub fn assign_member(
        &self,
        project_id: i64,
        user_id: i64,
        role_id: Option<i64>,
    ) -> ServiceResult<()> {
        SqliteRecordRepository::try_new(self.conn, &PROJECTS)?.find_or_fail(project_id)?;
        SqliteRecordRepository::try_new(self.conn, &USERS)?.find_or_fail(user_id)?;

        let role = role_id.map_or(Value::Null, Value::Integer);
        PROJECT_MEMBERS.upsert_link(self.conn, project_id, user_id, record([("role_id", role)]))?;
        info!(
            "event=project_member_assign module=service status=ok project_id={project_id} user_id={user_id}"
        );
        Ok(())
    }

    /// Removes `user_id` from `project_id`; returns whether they were a member.
    pub fn remove_member(&self, project_id: i64, user_id: i64) -> ServiceResult<bool> {
        Ok(PROJECT_MEMBERS.unlink(self.conn, project_id, user_id)?)
    }

    /// Active members of an active project, ordered by user id.
    pub fn members(&self, project_id: i64) -> ServiceResult<Vec<ProjectMember>> {
        SqliteRecordRepository::try_new(self.conn, &PROJECTS)?.find_or_fail(project_id)?;
        let users = repository(self.conn, &USERS)?;

        let options = QueryOptions::new()
            .select(&["users.*", "project_members.role_id member_role_id"])
            .join(Join::new(
                JoinType::Inner,
                PROJECT_MEMBERS.table,
                "project_members.user_id",
                "users.id",
            ))
            .filter(Condition::eq("project_members.project_id", project_id))
            .order_by(OrderBy::asc("users.id"));

        users
            .select(&options)?
            .into_iter()
            .map(|mut row| -> ServiceResult<ProjectMember> {
                let role_id = match row.remove("member_role_id") {
                    Some(Value::Integer(id)) => Some(id),
                    _ => None,
                };
                Ok(ProjectMember {
                    user: User::from_record(row)?,
                    role_id,
                })
            })
            .collect()
    }
}
