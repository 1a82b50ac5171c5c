//! Department record.

use super::{check_length, now_epoch_ms, require_text, Employee, EmployeeId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DepartmentId = Uuid;

pub const NAME_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Organisational unit that employees belong to.
///
/// The member list is a back-reference (`employees.department_id`), never a
/// stored column; `employees` is only filled by an eager read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    /// Optional head of the department.
    pub manager_id: Option<EmployeeId>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<Box<Employee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<Vec<Employee>>,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            manager_id: None,
            created_at: now_epoch_ms(),
            updated_at: None,
            manager: None,
            employees: None,
        }
    }

    /// Stamps `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Some(now_epoch_ms());
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, NAME_MAX_CHARS)?;
        if let Some(description) = &self.description {
            check_length("description", description, DESCRIPTION_MAX_CHARS)?;
        }
        Ok(())
    }
}
