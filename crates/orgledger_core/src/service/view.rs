//! Flattened records exchanged with presentation callers.
//!
//! Views carry denormalised display names (department, manager, assignee)
//! instead of entity graphs. On writes the services copy only the editable
//! fields back; system-managed fields such as `image_path`, timestamps and
//! the aggregates are ignored.

use super::hierarchy::DepartmentAggregates;
use crate::model::{
    now_epoch_ms, Department, DepartmentId, Employee, EmployeeId, Task, TaskId, TaskPriority,
    TaskStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeView {
    /// `None` on create.
    pub id: Option<EmployeeId>,
    pub first_name: String,
    pub last_name: String,
    pub salary_cents: i64,
    pub is_active: bool,
    /// Read-only; set by the image store.
    pub image_path: Option<String>,
    pub user_id: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub manager_id: Option<EmployeeId>,
    pub department_name: Option<String>,
    pub manager_name: Option<String>,
}

impl EmployeeView {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Maps an employee read with its `department` and `manager` includes.
    pub fn from_entity(employee: &Employee) -> Self {
        Self {
            id: Some(employee.id),
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            salary_cents: employee.salary_cents,
            is_active: employee.is_active,
            image_path: employee.image_path.clone(),
            user_id: employee.user_id.clone(),
            department_id: Some(employee.department_id),
            manager_id: employee.manager_id,
            department_name: employee.department.as_ref().map(|dept| dept.name.clone()),
            manager_name: employee.manager.as_ref().map(|manager| manager.full_name()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentView {
    pub id: Option<DepartmentId>,
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<EmployeeId>,
    pub manager_name: Option<String>,
    /// Live count, recomputed on every read.
    pub employee_count: u64,
    /// Live salary total in cents, recomputed on every read.
    pub total_salary_cents: i64,
}

impl DepartmentView {
    /// Maps a department read with its `employees` and `manager` includes.
    pub fn from_entity(department: &Department) -> Self {
        let aggregates = department
            .employees
            .as_deref()
            .map(DepartmentAggregates::from_members)
            .unwrap_or_default();
        Self {
            id: Some(department.id),
            name: department.name.clone(),
            description: department.description.clone(),
            manager_id: department.manager_id,
            manager_name: department.manager.as_ref().map(|manager| manager.full_name()),
            employee_count: aggregates.employee_count,
            total_salary_cents: aggregates.total_salary_cents,
        }
    }
}

/// Department with its live members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentWithEmployees {
    pub department: DepartmentView,
    pub employees: Vec<EmployeeView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskView {
    pub id: Option<TaskId>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub start_at: i64,
    pub due_at: i64,
    /// Primary assignee.
    pub employee_id: Option<EmployeeId>,
    pub employee_name: Option<String>,
    pub created_by_manager_id: Option<EmployeeId>,
    pub created_by_manager_name: Option<String>,
    /// Every assignee, earliest assignment first. Empty unless loaded.
    pub assignee_ids: Vec<EmployeeId>,
    pub is_overdue: bool,
}

impl Default for TaskView {
    fn default() -> Self {
        let now = now_epoch_ms();
        Self {
            id: None,
            title: String::new(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            start_at: now,
            due_at: now + 7 * 24 * 60 * 60 * 1000,
            employee_id: None,
            employee_name: None,
            created_by_manager_id: None,
            created_by_manager_name: None,
            assignee_ids: Vec::new(),
            is_overdue: false,
        }
    }
}

impl TaskView {
    pub fn from_entity(task: &Task) -> Self {
        Self {
            id: Some(task.id),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            start_at: task.start_at,
            due_at: task.due_at,
            employee_id: Some(task.employee_id),
            employee_name: task.assigned_employee.as_ref().map(|e| e.full_name()),
            created_by_manager_id: task.created_by_manager_id,
            created_by_manager_name: task.created_by_manager.as_ref().map(|m| m.full_name()),
            assignee_ids: task
                .assignments
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|assignment| assignment.employee_id)
                .collect(),
            is_overdue: task.is_overdue(now_epoch_ms()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EmployeeView, TaskView};
    use crate::model::TaskStatus;

    #[test]
    fn task_view_accepts_minimal_json() {
        let view: TaskView = serde_json::from_str(r#"{"title":"Write report"}"#).unwrap();
        assert_eq!(view.status, TaskStatus::New);
        assert!(view.due_at >= view.start_at);
        assert!(view.id.is_none());
    }

    #[test]
    fn employee_view_round_trips_display_names() {
        let view = EmployeeView {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            department_name: Some("Research".to_string()),
            ..EmployeeView::default()
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"department_name\":\"Research\""));
        let back: EmployeeView = serde_json::from_str(&json).unwrap();
        assert_eq!(back.full_name(), "Ada Lovelace");
    }
}
