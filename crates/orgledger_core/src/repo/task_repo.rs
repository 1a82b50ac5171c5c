//! Task table mapping and assignee-based lookups.

use super::entity::{
    opt_int_value, opt_text_value, opt_uuid_value, read_opt_uuid, read_uuid, text_value,
    uuid_value, Entity, IncludePath,
};
use super::generic::{load_by_ids, select_in, Repository, SqliteRepository};
use super::query::{Criterion, Query};
use super::{AssignmentInclude, RepoError, RepoResult};
use crate::model::{
    Assignment, Employee, EmployeeId, Task, TaskId, TaskPriority, TaskStatus, ValidationError,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::collections::HashMap;

pub type TaskRepository<'uow> = SqliteRepository<'uow, Task>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskInclude {
    AssignedEmployee,
    CreatedByManager,
    Assignments,
    /// Assignments with their employee loaded; implies `Assignments`.
    AssignmentEmployees,
}

impl IncludePath for TaskInclude {
    const ALL: &'static [Self] = &[
        Self::AssignedEmployee,
        Self::CreatedByManager,
        Self::Assignments,
        Self::AssignmentEmployees,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::AssignedEmployee => "assigned_employee",
            Self::CreatedByManager => "created_by_manager",
            Self::Assignments => "assignments",
            Self::AssignmentEmployees => "assignments.employee",
        }
    }
}

impl Entity for Task {
    type Key = TaskId;
    type Include = TaskInclude;

    const NAME: &'static str = "task";
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "status",
        "priority",
        "start_at",
        "due_at",
        "employee_id",
        "created_by_manager_id",
        "created_at",
        "updated_at",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];

    fn key(&self) -> TaskId {
        self.id
    }

    fn key_values(key: &TaskId) -> Vec<Value> {
        vec![uuid_value(*key)]
    }

    fn describe_key(key: &TaskId) -> String {
        key.to_string()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            text_value(&self.title),
            opt_text_value(self.description.as_deref()),
            text_value(self.status.as_str()),
            Value::Integer(self.priority.rank()),
            Value::Integer(self.start_at),
            Value::Integer(self.due_at),
            uuid_value(self.employee_id),
            opt_uuid_value(self.created_by_manager_id),
            Value::Integer(self.created_at),
            opt_int_value(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let status: String = row.get("status")?;
        let status = TaskStatus::parse(&status)
            .ok_or_else(|| RepoError::InvalidData(format!("invalid task status `{status}`")))?;
        let rank: i64 = row.get("priority")?;
        let priority = TaskPriority::from_rank(rank)
            .ok_or_else(|| RepoError::InvalidData(format!("invalid task priority `{rank}`")))?;

        Ok(Self {
            id: read_uuid(row, "id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            status,
            priority,
            start_at: row.get("start_at")?,
            due_at: row.get("due_at")?,
            employee_id: read_uuid(row, "employee_id")?,
            created_by_manager_id: read_opt_uuid(row, "created_by_manager_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            assigned_employee: None,
            created_by_manager: None,
            assignments: None,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Task::validate(self)
    }

    fn load_includes(conn: &Connection, items: &mut [Self], includes: &[TaskInclude]) -> RepoResult<()> {
        if includes.contains(&TaskInclude::AssignedEmployee) {
            let employees: HashMap<_, Employee> =
                load_by_ids(conn, items.iter().map(|item| item.employee_id))?;
            for item in items.iter_mut() {
                item.assigned_employee = employees.get(&item.employee_id).cloned().map(Box::new);
            }
        }

        if includes.contains(&TaskInclude::CreatedByManager) {
            let managers: HashMap<_, Employee> = load_by_ids(
                conn,
                items.iter().filter_map(|item| item.created_by_manager_id),
            )?;
            for item in items.iter_mut() {
                item.created_by_manager = item
                    .created_by_manager_id
                    .and_then(|id| managers.get(&id).cloned())
                    .map(Box::new);
            }
        }

        let with_employees = includes.contains(&TaskInclude::AssignmentEmployees);
        if with_employees || includes.contains(&TaskInclude::Assignments) {
            let mut assignments: Vec<Assignment> =
                select_in(conn, "task_id", items.iter().map(|item| item.id))?;
            if with_employees && !assignments.is_empty() {
                Assignment::load_includes(conn, &mut assignments, &[AssignmentInclude::Employee])?;
            }
            let mut by_task: HashMap<TaskId, Vec<Assignment>> = HashMap::new();
            for assignment in assignments {
                by_task.entry(assignment.task_id).or_default().push(assignment);
            }
            for item in items.iter_mut() {
                item.assignments = Some(by_task.remove(&item.id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

const ASSIGNED_TO_SQL: &str = "EXISTS (SELECT 1 FROM task_assignments a \
     WHERE a.task_id = tasks.id AND a.employee_id = ?)";

const ASSIGNED_UNDER_MANAGER_SQL: &str = "EXISTS (SELECT 1 FROM task_assignments a \
     JOIN employees e ON e.id = a.employee_id \
     WHERE a.task_id = tasks.id AND e.manager_id = ? AND e.is_active = 1)";

const OVERDUE_SQL: &str = "due_at < ? AND status NOT IN ('completed', 'cancelled')";

impl SqliteRepository<'_, Task> {
    /// Tasks with an assignment row for `employee_id`.
    pub fn list_by_assignee(
        &self,
        employee_id: EmployeeId,
        includes: &[TaskInclude],
    ) -> RepoResult<Vec<Task>> {
        self.get_all(
            &Query::new()
                .filter(Criterion::Sql(ASSIGNED_TO_SQL, vec![uuid_value(employee_id)]))
                .include_paths(includes.iter().copied()),
        )
    }

    /// Tasks assigned to any current, active direct report of `manager_id`.
    ///
    /// Resolved through the assignee's present manager reference, not the
    /// manager recorded when the task was created.
    pub fn list_by_assignee_manager(
        &self,
        manager_id: EmployeeId,
        includes: &[TaskInclude],
    ) -> RepoResult<Vec<Task>> {
        self.get_all(
            &Query::new()
                .filter(Criterion::Sql(
                    ASSIGNED_UNDER_MANAGER_SQL,
                    vec![uuid_value(manager_id)],
                ))
                .include_paths(includes.iter().copied()),
        )
    }

    pub fn list_by_status(
        &self,
        status: TaskStatus,
        includes: &[TaskInclude],
    ) -> RepoResult<Vec<Task>> {
        self.get_all(
            &Query::new()
                .where_eq("status", text_value(status.as_str()))
                .include_paths(includes.iter().copied()),
        )
    }

    /// Open tasks whose due date is before `now_ms`.
    pub fn list_overdue(&self, now_ms: i64, includes: &[TaskInclude]) -> RepoResult<Vec<Task>> {
        self.get_all(
            &Query::new()
                .filter(Criterion::Sql(OVERDUE_SQL, vec![Value::Integer(now_ms)]))
                .include_paths(includes.iter().copied()),
        )
    }
}
