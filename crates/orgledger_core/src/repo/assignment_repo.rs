//! Task assignment link table.

use super::entity::{read_uuid, uuid_value, Entity, IncludePath};
use super::generic::{load_by_ids, Repository, SqliteRepository};
use super::query::Query;
use super::RepoResult;
use crate::model::{Assignment, Employee, EmployeeId, Task, TaskId};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::collections::HashMap;

pub type AssignmentRepository<'uow> = SqliteRepository<'uow, Assignment>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentInclude {
    Task,
    Employee,
}

impl IncludePath for AssignmentInclude {
    const ALL: &'static [Self] = &[Self::Task, Self::Employee];

    fn name(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Employee => "employee",
        }
    }
}

impl Entity for Assignment {
    type Key = (TaskId, EmployeeId);
    type Include = AssignmentInclude;

    const NAME: &'static str = "assignment";
    const TABLE: &'static str = "task_assignments";
    const COLUMNS: &'static [&'static str] = &["task_id", "employee_id", "assigned_at"];
    const KEY_COLUMNS: &'static [&'static str] = &["task_id", "employee_id"];

    fn key(&self) -> (TaskId, EmployeeId) {
        Assignment::key(self)
    }

    fn key_values(key: &(TaskId, EmployeeId)) -> Vec<Value> {
        vec![uuid_value(key.0), uuid_value(key.1)]
    }

    fn describe_key(key: &(TaskId, EmployeeId)) -> String {
        format!("task={} employee={}", key.0, key.1)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.task_id),
            uuid_value(self.employee_id),
            Value::Integer(self.assigned_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            task_id: read_uuid(row, "task_id")?,
            employee_id: read_uuid(row, "employee_id")?,
            assigned_at: row.get("assigned_at")?,
            task: None,
            employee: None,
        })
    }

    fn load_includes(
        conn: &Connection,
        items: &mut [Self],
        includes: &[AssignmentInclude],
    ) -> RepoResult<()> {
        for include in includes {
            match include {
                AssignmentInclude::Task => {
                    let tasks: HashMap<_, Task> =
                        load_by_ids(conn, items.iter().map(|item| item.task_id))?;
                    for item in items.iter_mut() {
                        item.task = tasks.get(&item.task_id).cloned().map(Box::new);
                    }
                }
                AssignmentInclude::Employee => {
                    let employees: HashMap<_, Employee> =
                        load_by_ids(conn, items.iter().map(|item| item.employee_id))?;
                    for item in items.iter_mut() {
                        item.employee = employees.get(&item.employee_id).cloned().map(Box::new);
                    }
                }
            }
        }
        Ok(())
    }
}

impl SqliteRepository<'_, Assignment> {
    pub fn get_pair(
        &self,
        task_id: TaskId,
        employee_id: EmployeeId,
    ) -> RepoResult<Option<Assignment>> {
        self.find(&(task_id, employee_id), false)
    }

    /// Assignments of one task, earliest first.
    pub fn list_by_task(
        &self,
        task_id: TaskId,
        includes: &[AssignmentInclude],
    ) -> RepoResult<Vec<Assignment>> {
        self.get_all(
            &Query::new()
                .where_eq("task_id", uuid_value(task_id))
                .include_paths(includes.iter().copied()),
        )
    }

    pub fn list_by_employee(
        &self,
        employee_id: EmployeeId,
        includes: &[AssignmentInclude],
    ) -> RepoResult<Vec<Assignment>> {
        self.get_all(
            &Query::new()
                .where_eq("employee_id", uuid_value(employee_id))
                .include_paths(includes.iter().copied()),
        )
    }
}
