//! Use-case services over the unit of work.
//!
//! # Responsibility
//! - Orchestrate repository calls into the department, employee and task
//!   use cases, committing or rolling back each one as a unit.
//! - Translate between flattened view records and entity mutations.
//! - Report every failure through one [`ServiceError`] taxonomy; no
//!   sentinel `None`/`false` results stand in for "not found".
//!
//! # Invariants
//! - Multi-row writes (task create/delete/reassign) run inside one explicit
//!   transaction; any failure rolls the whole operation back.
//! - Referenced foreign entities are checked before writing and reported as
//!   `Validation`, never as a raw constraint error.
//! - Only duplicate keys become `Conflict`; any other constraint failure
//!   during a flush is `Unexpected`.

use crate::model::ValidationError;
use crate::repo::RepoError;
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod access;
pub mod department_service;
pub mod employee_service;
pub mod hierarchy;
pub mod task_service;
pub mod view;

pub use access::{CurrentUser, Role, UserContext};
pub use department_service::DepartmentService;
pub use employee_service::EmployeeService;
pub use hierarchy::DepartmentAggregates;
pub use task_service::TaskService;
pub use view::{DepartmentView, DepartmentWithEmployees, EmployeeView, TaskView};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse error class, for callers mapping errors onto their own surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unexpected,
}

#[derive(Debug)]
pub enum ServiceError {
    /// Identifier does not resolve to a live record.
    NotFound { entity: &'static str, id: String },
    /// Missing or out-of-range input, or a referenced entity that does not
    /// exist.
    Validation(String),
    /// Duplicate assignment or a delete blocked by dependents.
    Conflict(String),
    /// Store or transaction failure.
    Unexpected(Box<dyn Error + Send + Sync>),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Unexpected(err) => write!(f, "unexpected failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unexpected(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, id: key },
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            RepoError::UnknownInclude { .. } => Self::Validation(value.to_string()),
            RepoError::Duplicate(message) => Self::Conflict(message),
            other => Self::Unexpected(Box::new(other)),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Io(_) => Self::Unexpected(Box::new(value)),
            other => Self::Validation(other.to_string()),
        }
    }
}
