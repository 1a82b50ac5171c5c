//! Employee table mapping and hierarchy lookups.

use super::entity::{
    bool_value, opt_int_value, opt_text_value, opt_uuid_value, read_bool, read_opt_uuid,
    read_uuid, text_value, uuid_value, Entity, IncludePath,
};
use super::generic::{load_by_ids, load_groups, Repository, SqliteRepository};
use super::query::{like_pattern, Criterion, Query};
use super::{RepoError, RepoResult};
use crate::model::{Department, DepartmentId, Employee, EmployeeId, ValidationError};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub type EmployeeRepository<'uow> = SqliteRepository<'uow, Employee>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeInclude {
    Department,
    Manager,
    /// Direct reports only.
    Subordinates,
}

impl IncludePath for EmployeeInclude {
    const ALL: &'static [Self] = &[Self::Department, Self::Manager, Self::Subordinates];

    fn name(self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Manager => "manager",
            Self::Subordinates => "subordinates",
        }
    }
}

impl Entity for Employee {
    type Key = EmployeeId;
    type Include = EmployeeInclude;

    const NAME: &'static str = "employee";
    const TABLE: &'static str = "employees";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "first_name",
        "last_name",
        "salary_cents",
        "is_active",
        "image_path",
        "user_id",
        "department_id",
        "manager_id",
        "created_at",
        "updated_at",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");

    fn key(&self) -> EmployeeId {
        self.id
    }

    fn key_values(key: &EmployeeId) -> Vec<Value> {
        vec![uuid_value(*key)]
    }

    fn describe_key(key: &EmployeeId) -> String {
        key.to_string()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            text_value(&self.first_name),
            text_value(&self.last_name),
            Value::Integer(self.salary_cents),
            bool_value(self.is_active),
            opt_text_value(self.image_path.as_deref()),
            opt_text_value(self.user_id.as_deref()),
            uuid_value(self.department_id),
            opt_uuid_value(self.manager_id),
            Value::Integer(self.created_at),
            opt_int_value(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: read_uuid(row, "id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            salary_cents: row.get("salary_cents")?,
            is_active: read_bool(row, "is_active")?,
            image_path: row.get("image_path")?,
            user_id: row.get("user_id")?,
            department_id: read_uuid(row, "department_id")?,
            manager_id: read_opt_uuid(row, "manager_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            department: None,
            manager: None,
            subordinates: None,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Employee::validate(self)
    }

    fn load_includes(
        conn: &Connection,
        items: &mut [Self],
        includes: &[EmployeeInclude],
    ) -> RepoResult<()> {
        for include in includes {
            match include {
                EmployeeInclude::Department => {
                    let departments: HashMap<_, Department> =
                        load_by_ids(conn, items.iter().map(|item| item.department_id))?;
                    for item in items.iter_mut() {
                        item.department = departments.get(&item.department_id).cloned().map(Box::new);
                    }
                }
                EmployeeInclude::Manager => {
                    let managers: HashMap<_, Employee> =
                        load_by_ids(conn, items.iter().filter_map(|item| item.manager_id))?;
                    for item in items.iter_mut() {
                        item.manager = item
                            .manager_id
                            .and_then(|id| managers.get(&id).cloned())
                            .map(Box::new);
                    }
                }
                EmployeeInclude::Subordinates => {
                    let mut reports = load_groups::<Employee>(
                        conn,
                        "manager_id",
                        items.iter().map(|item| item.id),
                        |report| report.manager_id,
                    )?;
                    for item in items.iter_mut() {
                        item.subordinates = Some(reports.remove(&item.id).unwrap_or_default());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Rows that still reference an employee, inactive rows included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmployeeDependents {
    pub subordinates: u64,
    pub managed_departments: u64,
    /// Tasks assigned to, or created by, the employee.
    pub tasks: u64,
}

impl EmployeeDependents {
    pub fn is_empty(&self) -> bool {
        self.subordinates == 0 && self.managed_departments == 0 && self.tasks == 0
    }
}

const SEARCH_SQL: &str = "first_name LIKE ? ESCAPE '\\' OR last_name LIKE ? ESCAPE '\\' \
     OR EXISTS (SELECT 1 FROM departments d WHERE d.id = employees.department_id \
     AND d.name LIKE ? ESCAPE '\\')";

impl SqliteRepository<'_, Employee> {
    /// Direct reports of `manager_id`; never the transitive subtree.
    pub fn list_subordinates(
        &self,
        manager_id: EmployeeId,
        includes: &[EmployeeInclude],
    ) -> RepoResult<Vec<Employee>> {
        self.get_all(
            &Query::new()
                .where_eq("manager_id", uuid_value(manager_id))
                .include_paths(includes.iter().copied()),
        )
    }

    pub fn list_by_department(
        &self,
        department_id: DepartmentId,
        includes: &[EmployeeInclude],
    ) -> RepoResult<Vec<Employee>> {
        self.get_all(
            &Query::new()
                .where_eq("department_id", uuid_value(department_id))
                .include_paths(includes.iter().copied()),
        )
    }

    pub fn find_by_user_id(
        &self,
        user_id: &str,
        includes: &[EmployeeInclude],
    ) -> RepoResult<Option<Employee>> {
        self.get_first_or_default(
            &Query::new()
                .where_eq("user_id", text_value(user_id))
                .include_paths(includes.iter().copied()),
        )
    }

    /// Case-insensitive match on first name, last name or department name.
    pub fn search(&self, term: &str, includes: &[EmployeeInclude]) -> RepoResult<Vec<Employee>> {
        let pattern = Value::Text(like_pattern(term.trim()));
        self.get_all(
            &Query::new()
                .filter(Criterion::Sql(
                    SEARCH_SQL,
                    vec![pattern.clone(), pattern.clone(), pattern],
                ))
                .include_paths(includes.iter().copied()),
        )
    }

    /// Stored manager reference of `id`, read regardless of the active flag.
    ///
    /// Returns `None` both for a missing row and for an employee without a
    /// manager.
    pub fn manager_of(&self, id: EmployeeId) -> RepoResult<Option<EmployeeId>> {
        let stored: Option<Option<String>> = self
            .conn()
            .query_row(
                "SELECT manager_id FROM employees WHERE id = ?1;",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match stored.flatten() {
            Some(text) => Uuid::parse_str(&text).map(Some).map_err(|_| {
                RepoError::InvalidData(format!("invalid uuid `{text}` in column manager_id"))
            }),
            None => Ok(None),
        }
    }

    pub fn count_dependents(&self, id: EmployeeId) -> RepoResult<EmployeeDependents> {
        let id = id.to_string();
        let conn = self.conn();
        let count = |sql: &str| -> RepoResult<u64> {
            let value: i64 = conn.query_row(sql, params![id], |row| row.get(0))?;
            Ok(value.max(0) as u64)
        };
        Ok(EmployeeDependents {
            subordinates: count("SELECT COUNT(*) FROM employees WHERE manager_id = ?1;")?,
            managed_departments: count("SELECT COUNT(*) FROM departments WHERE manager_id = ?1;")?,
            tasks: count(
                "SELECT COUNT(*) FROM tasks
                 WHERE employee_id = ?1
                    OR created_by_manager_id = ?1
                    OR EXISTS (
                        SELECT 1 FROM task_assignments a
                        WHERE a.task_id = tasks.id AND a.employee_id = ?1
                    );",
            )?,
        })
    }
}
