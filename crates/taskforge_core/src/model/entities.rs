//! Descriptors for every table the record layer serves.

use crate::record::{AssociationDescriptor, EntityDescriptor, RecordResult, SqliteRecordRepository};
use rusqlite::Connection;

pub const COMPANIES: EntityDescriptor = EntityDescriptor::new("Company", "companies")
    .fillable(&["name", "email", "phone", "address", "website", "status"])
    .searchable(&["name", "email"]);

pub const USERS: EntityDescriptor = EntityDescriptor::new("User", "users")
    .fillable(&[
        "company_id",
        "role_id",
        "first_name",
        "last_name",
        "email",
        "password_hash",
        "status",
        "activation_token",
        "reset_token",
        "last_login_at",
    ])
    .hidden(&["password_hash", "activation_token", "reset_token"])
    .searchable(&["first_name", "last_name", "email"]);

pub const PROJECTS: EntityDescriptor = EntityDescriptor::new("Project", "projects")
    .fillable(&[
        "company_id",
        "owner_id",
        "name",
        "description",
        "status_id",
        "start_date",
        "end_date",
        "budget",
    ])
    .searchable(&["name", "description"]);

pub const MILESTONES: EntityDescriptor = EntityDescriptor::new("Milestone", "milestones")
    .fillable(&["project_id", "title", "description", "due_date", "status_id"])
    .searchable(&["title"]);

pub const TASKS: EntityDescriptor = EntityDescriptor::new("Task", "tasks")
    .fillable(&[
        "project_id",
        "milestone_id",
        "parent_task_id",
        "assigned_to",
        "title",
        "description",
        "status_id",
        "priority",
        "due_date",
        "estimated_hours",
    ])
    .searchable(&["title", "description"]);

pub const ROLES: EntityDescriptor = EntityDescriptor::new("Role", "roles")
    .fillable(&["name", "description"])
    .searchable(&["name"]);

/// Permissions are catalogue rows and are removed physically.
pub const PERMISSIONS: EntityDescriptor = EntityDescriptor::new("Permission", "permissions")
    .fillable(&["name", "description", "category"])
    .guarded(&["id", "created_at", "updated_at"])
    .searchable(&["name", "category"])
    .soft_delete(false);

pub const TEMPLATES: EntityDescriptor = EntityDescriptor::new("Template", "templates")
    .fillable(&["name", "description", "content", "is_default"])
    .searchable(&["name"]);

pub const ROLE_PERMISSIONS: AssociationDescriptor =
    AssociationDescriptor::new("RolePermission", "role_permissions", "role_id", "permission_id");

/// Project membership; `role_id` is the member's role inside the project.
pub const PROJECT_MEMBERS: AssociationDescriptor =
    AssociationDescriptor::new("ProjectMember", "project_members", "project_id", "user_id")
        .extra_columns(&["role_id"]);

pub const ALL_ENTITIES: &[EntityDescriptor] = &[
    COMPANIES, USERS, PROJECTS, MILESTONES, TASKS, ROLES, PERMISSIONS, TEMPLATES,
];

/// Repository for `entity` that masks the hidden columns of any catalogued
/// entity it joins.
pub fn repository<'conn>(
    conn: &'conn Connection,
    entity: &EntityDescriptor,
) -> RecordResult<SqliteRecordRepository<'conn>> {
    Ok(SqliteRecordRepository::try_new(conn, entity)?.with_related(ALL_ENTITIES))
}
