//! Manager hierarchy and department rollups.
//!
//! # Invariants
//! - Subordinate lookups are one level deep; callers recurse for subtrees.
//! - Aggregates are recomputed from the live member set on every read and
//!   never stored.
//! - Manager chains are walked with a visited set, so a corrupted cyclic
//!   chain still terminates.

use crate::model::{DepartmentId, Employee, EmployeeId, Task};
use crate::repo::{EmployeeInclude, RepoResult, TaskInclude};
use crate::uow::UnitOfWork;
use std::collections::HashSet;

/// Derived, non-stored department figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepartmentAggregates {
    pub employee_count: u64,
    pub total_salary_cents: i64,
}

impl DepartmentAggregates {
    /// Folds over active members; inactive rows are skipped if present.
    pub fn from_members(members: &[Employee]) -> Self {
        members
            .iter()
            .filter(|member| member.is_active)
            .fold(Self::default(), |acc, member| Self {
                employee_count: acc.employee_count + 1,
                total_salary_cents: acc.total_salary_cents.saturating_add(member.salary_cents),
            })
    }
}

/// Recomputes the rollup of one department from the store.
pub fn aggregate_department(
    uow: &UnitOfWork,
    department_id: DepartmentId,
) -> RepoResult<DepartmentAggregates> {
    let members = uow.employees().list_by_department(department_id, &[])?;
    Ok(DepartmentAggregates::from_members(&members))
}

/// Active employees whose manager is `manager_id`.
pub fn direct_reports(
    uow: &UnitOfWork,
    manager_id: EmployeeId,
    includes: &[EmployeeInclude],
) -> RepoResult<Vec<Employee>> {
    uow.employees().list_subordinates(manager_id, includes)
}

/// Tasks currently assigned to a direct report of `manager_id`.
pub fn tasks_of_direct_reports(
    uow: &UnitOfWork,
    manager_id: EmployeeId,
    includes: &[TaskInclude],
) -> RepoResult<Vec<Task>> {
    uow.tasks().list_by_assignee_manager(manager_id, includes)
}

/// Whether `target` appears on the manager chain starting at `start`
/// (`start` itself included). Inactive employees are followed too.
pub fn manager_chain_contains(
    uow: &UnitOfWork,
    start: EmployeeId,
    target: EmployeeId,
) -> RepoResult<bool> {
    let employees = uow.employees();
    let mut visited = HashSet::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if id == target {
            return Ok(true);
        }
        if !visited.insert(id) {
            return Ok(false);
        }
        current = employees.manager_of(id)?;
    }
    Ok(false)
}

/// Whether making `manager_id` the manager of `employee_id` closes a loop.
pub fn would_create_cycle(
    uow: &UnitOfWork,
    employee_id: EmployeeId,
    manager_id: EmployeeId,
) -> RepoResult<bool> {
    manager_chain_contains(uow, manager_id, employee_id)
}
