//! Generic repository layer over the organisation store.
//!
//! # Responsibility
//! - One generic CRUD implementation ([`SqliteRepository`]) shared by every
//!   entity type; per-entity modules only describe their table and add the
//!   queries that are specific to them.
//! - Buffer writes in the owning unit of work's [`ChangeSet`] until it is
//!   saved.
//!
//! # Invariants
//! - Writes validate the entity before they are buffered.
//! - Reads hit the store and never observe unflushed writes.
//! - Inactive employees are filtered from every read, eager loads included,
//!   unless the query opts in with `with_inactive()`.
//! - Eager loads cost one query per include path, independent of row count.

use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::{ffi, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod assignment_repo;
pub mod change_set;
pub mod department_repo;
pub mod employee_repo;
pub mod entity;
pub mod generic;
pub mod query;
pub mod task_repo;

pub use assignment_repo::{AssignmentInclude, AssignmentRepository};
pub use change_set::{ChangeSet, WriteKind};
pub use department_repo::{DepartmentInclude, DepartmentRepository};
pub use employee_repo::{EmployeeDependents, EmployeeInclude, EmployeeRepository};
pub use entity::{parse_includes, Entity, IncludePath};
pub use generic::{Repository, SqliteRepository};
pub use query::{Criterion, Query};
pub use task_repo::{TaskInclude, TaskRepository};

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure raised by repositories and the unit of work.
#[derive(Debug)]
pub enum RepoError {
    /// Store or driver failure.
    Db(DbError),
    /// Entity rejected before it reached SQL.
    Validation(ValidationError),
    /// No live row for the given key.
    NotFound { entity: &'static str, key: String },
    /// A unique or primary key already holds the written value.
    Duplicate(String),
    /// The store refused the write for any other constraint (foreign key,
    /// check, trigger abort).
    Constraint(String),
    /// A persisted row could not be decoded.
    InvalidData(String),
    /// Include path name not known for the entity.
    UnknownInclude { entity: &'static str, path: String },
    /// `begin_transaction` called while a transaction is open.
    TransactionAlreadyActive,
    /// Commit or rollback requested with no open transaction.
    NoActiveTransaction,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Duplicate(message) => write!(f, "duplicate key: {message}"),
            Self::Constraint(message) => write!(f, "constraint violated: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UnknownInclude { entity, path } => {
                write!(f, "unknown include path `{path}` for {entity}")
            }
            Self::TransactionAlreadyActive => write!(f, "a transaction is already active"),
            Self::NoActiveTransaction => write!(f, "no active transaction"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &value {
            if failure.code == ErrorCode::ConstraintViolation {
                return match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Self::Duplicate(value.to_string())
                    }
                    _ => Self::Constraint(value.to_string()),
                };
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}
