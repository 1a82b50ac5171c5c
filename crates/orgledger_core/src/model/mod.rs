//! Plain entity records for the organisation store.
//!
//! # Responsibility
//! - Define the stored shape of departments, employees, tasks and task
//!   assignments.
//! - Own field-level invariants (`validate`) that every write path checks
//!   before touching SQL.
//!
//! # Invariants
//! - Identities are UUID v4 values generated on the client, so a buffered
//!   insert knows its key before the change set is flushed.
//! - Timestamps are Unix epoch milliseconds.
//! - Navigation fields (`department`, `manager`, `employees`, ...) are `None`
//!   unless the read that produced the record asked for them.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod assignment;
pub mod department;
pub mod employee;
pub mod task;

pub use assignment::Assignment;
pub use department::{Department, DepartmentId};
pub use employee::{Employee, EmployeeId};
pub use task::{Task, TaskId, TaskPriority, TaskStatus};

/// Field-level rule violated by an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trimming.
    EmptyField(&'static str),
    /// Text field exceeds its maximum length in characters.
    FieldTooLong { field: &'static str, max: usize },
    /// Salary below zero.
    NegativeSalary(i64),
    /// Employee names itself as manager.
    SelfManagement(EmployeeId),
    /// Task due date earlier than its start date.
    DueBeforeStart { start_at: i64, due_at: i64 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "`{field}` is required"),
            Self::FieldTooLong { field, max } => {
                write!(f, "`{field}` cannot exceed {max} characters")
            }
            Self::NegativeSalary(value) => {
                write!(f, "salary must not be negative (got {value} cents)")
            }
            Self::SelfManagement(id) => write!(f, "employee {id} cannot manage itself"),
            Self::DueBeforeStart { start_at, due_at } => {
                write!(f, "due date {due_at} is earlier than start date {start_at}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    check_length(field, value, max)
}

pub(crate) fn check_length(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}
