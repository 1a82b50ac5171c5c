//! Employee record and its manager self-reference.

use super::{now_epoch_ms, require_text, Department, DepartmentId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EmployeeId = Uuid;

pub const NAME_MAX_CHARS: usize = 50;

/// A person in the organisation.
///
/// # Invariants
/// - `salary_cents` is never negative.
/// - `manager_id`, when set, differs from `id`.
/// - `is_active == false` is the soft-deleted state; such rows are hidden
///   from default reads but still hold their foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    /// Salary in cents.
    pub salary_cents: i64,
    pub is_active: bool,
    /// Relative reference returned by the image store.
    pub image_path: Option<String>,
    /// Identity of the login account mapped to this employee.
    pub user_id: Option<String>,
    pub department_id: DepartmentId,
    pub manager_id: Option<EmployeeId>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Box<Department>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<Box<Employee>>,
    /// Direct reports only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subordinates: Option<Vec<Employee>>,
}

impl Employee {
    /// Creates an active employee stamped with the current time.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        salary_cents: i64,
        department_id: DepartmentId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            salary_cents,
            is_active: true,
            image_path: None,
            user_id: None,
            department_id,
            manager_id: None,
            created_at: now_epoch_ms(),
            updated_at: None,
            department: None,
            manager: None,
            subordinates: None,
        }
    }

    /// Display name used by denormalised views.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Stamps `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Some(now_epoch_ms());
    }

    /// Soft delete.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("first_name", &self.first_name, NAME_MAX_CHARS)?;
        require_text("last_name", &self.last_name, NAME_MAX_CHARS)?;
        if self.salary_cents < 0 {
            return Err(ValidationError::NegativeSalary(self.salary_cents));
        }
        if self.manager_id == Some(self.id) {
            return Err(ValidationError::SelfManagement(self.id));
        }
        Ok(())
    }
}
