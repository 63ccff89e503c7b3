//! Entity catalogue and typed records.
//!
//! # Responsibility
//! - Declare the descriptor of every persisted entity and junction table.
//! - Convert policy-filtered rows into typed structs where callers need them.
//!
//! # Invariants
//! - Descriptors are `const` and match the bootstrap schema in `db`.
//! - Typed records never carry hidden columns.

pub mod entities;
pub mod project;
pub mod user;

pub use entities::{
    repository, ALL_ENTITIES, COMPANIES, MILESTONES, PERMISSIONS, PROJECTS, PROJECT_MEMBERS, ROLES,
    ROLE_PERMISSIONS, TASKS, TEMPLATES, USERS,
};
pub use project::Project;
pub use user::{User, UserStatus};
