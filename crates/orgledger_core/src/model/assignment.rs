//! Task-to-employee link record.

use super::{now_epoch_ms, Employee, EmployeeId, Task, TaskId};
use serde::{Deserialize, Serialize};

/// One assignee of one task. Identity is the `(task_id, employee_id)` pair.
///
/// An assignment never outlives its task: task deletion removes the
/// task's assignment rows first, inside the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub employee_id: EmployeeId,
    pub assigned_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Box<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<Box<Employee>>,
}

impl Assignment {
    /// Links `task_id` to `employee_id`, stamped now.
    pub fn new(task_id: TaskId, employee_id: EmployeeId) -> Self {
        Self {
            task_id,
            employee_id,
            assigned_at: now_epoch_ms(),
            task: None,
            employee: None,
        }
    }

    pub fn key(&self) -> (TaskId, EmployeeId) {
        (self.task_id, self.employee_id)
    }
}
