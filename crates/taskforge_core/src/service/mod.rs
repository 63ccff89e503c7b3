//! Use-case services composed from the record layer.
//!
//! # Responsibility
//! - Orchestrate repository and association calls into use-case APIs.
//! - Translate record-layer absence into service-level errors.

pub mod project_service;
pub mod role_service;

pub use project_service::{ProjectMember, ProjectService};
pub use role_service::RoleService;

use crate::record::RecordError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for association use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Target entity does not exist or is soft-deleted.
    NotFound { entity: &'static str, id: i64 },
    /// Record-layer failure.
    Record(RecordError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Record(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Record(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<RecordError> for ServiceError {
    fn from(value: RecordError) -> Self {
        match value {
            RecordError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Record(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
