//! Department table mapping.

use super::entity::{
    opt_int_value, opt_text_value, opt_uuid_value, read_opt_uuid, read_uuid, text_value,
    uuid_value, Entity, IncludePath,
};
use super::generic::{count_rows, load_by_ids, load_groups, Repository, SqliteRepository};
use super::query::{Criterion, Query};
use super::RepoResult;
use crate::model::{Department, DepartmentId, Employee, ValidationError};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::collections::HashMap;

pub type DepartmentRepository<'uow> = SqliteRepository<'uow, Department>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartmentInclude {
    /// Live members, in insertion order.
    Employees,
    Manager,
}

impl IncludePath for DepartmentInclude {
    const ALL: &'static [Self] = &[Self::Employees, Self::Manager];

    fn name(self) -> &'static str {
        match self {
            Self::Employees => "employees",
            Self::Manager => "manager",
        }
    }
}

impl Entity for Department {
    type Key = DepartmentId;
    type Include = DepartmentInclude;

    const NAME: &'static str = "department";
    const TABLE: &'static str = "departments";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "manager_id",
        "created_at",
        "updated_at",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];

    fn key(&self) -> DepartmentId {
        self.id
    }

    fn key_values(key: &DepartmentId) -> Vec<Value> {
        vec![uuid_value(*key)]
    }

    fn describe_key(key: &DepartmentId) -> String {
        key.to_string()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            text_value(&self.name),
            opt_text_value(self.description.as_deref()),
            opt_uuid_value(self.manager_id),
            Value::Integer(self.created_at),
            opt_int_value(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: read_uuid(row, "id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            manager_id: read_opt_uuid(row, "manager_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            manager: None,
            employees: None,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Department::validate(self)
    }

    fn load_includes(
        conn: &Connection,
        items: &mut [Self],
        includes: &[DepartmentInclude],
    ) -> RepoResult<()> {
        for include in includes {
            match include {
                DepartmentInclude::Employees => {
                    let mut members = load_groups::<Employee>(
                        conn,
                        "department_id",
                        items.iter().map(|item| item.id),
                        |member| Some(member.department_id),
                    )?;
                    for item in items.iter_mut() {
                        item.employees = Some(members.remove(&item.id).unwrap_or_default());
                    }
                }
                DepartmentInclude::Manager => {
                    let managers: HashMap<_, Employee> =
                        load_by_ids(conn, items.iter().filter_map(|item| item.manager_id))?;
                    for item in items.iter_mut() {
                        item.manager = item
                            .manager_id
                            .and_then(|id| managers.get(&id).cloned())
                            .map(Box::new);
                    }
                }
            }
        }
        Ok(())
    }
}

impl SqliteRepository<'_, Department> {
    /// Employees whose `department_id` is `id`.
    ///
    /// `include_inactive` also counts soft-deleted rows, which still hold
    /// the foreign key.
    pub fn count_members(&self, id: DepartmentId, include_inactive: bool) -> RepoResult<u64> {
        count_rows::<Employee>(
            self.conn(),
            &[Criterion::Eq("department_id", uuid_value(id))],
            include_inactive,
        )
    }

    /// Case-insensitive match on name or description.
    pub fn search(
        &self,
        term: &str,
        includes: &[DepartmentInclude],
    ) -> RepoResult<Vec<Department>> {
        self.get_all(
            &Query::new()
                .filter(Criterion::AnyContains(
                    &["name", "description"],
                    term.trim().to_string(),
                ))
                .include_paths(includes.iter().copied()),
        )
    }
}
