//! Department use cases.
//!
//! # Invariants
//! - Views always carry live aggregates; nothing is cached between reads.
//! - A department referenced by any employee row, active or not, cannot be
//!   deleted.

use super::view::{DepartmentView, DepartmentWithEmployees, EmployeeView};
use super::{ServiceError, ServiceResult};
use crate::model::{Department, DepartmentId, EmployeeId};
use crate::repo::{DepartmentInclude, EmployeeInclude, Query, Repository};
use crate::uow::UnitOfWork;
use log::info;
use std::collections::HashMap;

const DETAIL: [DepartmentInclude; 2] = [DepartmentInclude::Employees, DepartmentInclude::Manager];

pub struct DepartmentService<'a> {
    uow: &'a UnitOfWork,
}

impl<'a> DepartmentService<'a> {
    pub fn new(uow: &'a UnitOfWork) -> Self {
        Self { uow }
    }

    pub fn get_all_departments(&self) -> ServiceResult<Vec<DepartmentView>> {
        let departments = self
            .uow
            .departments()
            .get_all(&Query::new().include_paths(DETAIL))?;
        Ok(departments.iter().map(DepartmentView::from_entity).collect())
    }

    pub fn get_department_by_id(&self, id: DepartmentId) -> ServiceResult<DepartmentView> {
        let department = self
            .uow
            .departments()
            .get_first_or_default(&Query::for_key(&id).include_paths(DETAIL))?
            .ok_or_else(|| ServiceError::not_found("department", id))?;
        Ok(DepartmentView::from_entity(&department))
    }

    pub fn create_department(&self, view: &DepartmentView) -> ServiceResult<DepartmentView> {
        self.check_manager(view.manager_id)?;
        let mut department = Department::new(view.name.trim());
        department.description = non_blank(view.description.as_deref());
        department.manager_id = view.manager_id;

        self.uow.departments().add(&department)?;
        self.uow.save_changes()?;
        info!(
            "event=department_create module=service status=ok department_id={}",
            department.id
        );
        self.get_department_by_id(department.id)
    }

    /// Replaces name, description and manager. Aggregates in `view` are
    /// ignored.
    pub fn update_department(&self, view: &DepartmentView) -> ServiceResult<DepartmentView> {
        let id = view
            .id
            .ok_or_else(|| ServiceError::Validation("department id is required".to_string()))?;
        let mut department = self.uow.departments().get_by_id(&id)?;
        self.check_manager(view.manager_id)?;

        department.name = view.name.trim().to_string();
        department.description = non_blank(view.description.as_deref());
        department.manager_id = view.manager_id;
        department.touch();

        self.uow.departments().update(&department)?;
        self.uow.save_changes()?;
        info!(
            "event=department_update module=service status=ok department_id={}",
            id
        );
        self.get_department_by_id(id)
    }

    pub fn delete_department(&self, id: DepartmentId) -> ServiceResult<()> {
        let department = self.uow.departments().get_by_id(&id)?;
        let members = self.uow.departments().count_members(id, true)?;
        if members > 0 {
            return Err(ServiceError::Conflict(format!(
                "department {id} still has {members} employee(s)"
            )));
        }

        self.uow.departments().delete(&department)?;
        self.uow.save_changes()?;
        info!(
            "event=department_delete module=service status=ok department_id={}",
            id
        );
        Ok(())
    }

    pub fn can_delete_department(&self, id: DepartmentId) -> ServiceResult<bool> {
        self.uow.departments().get_by_id(&id)?;
        Ok(self.uow.departments().count_members(id, true)? == 0)
    }

    /// Case-insensitive match on name or description; a blank term lists
    /// everything.
    pub fn search_departments(&self, term: &str) -> ServiceResult<Vec<DepartmentView>> {
        if term.trim().is_empty() {
            return self.get_all_departments();
        }
        let departments = self.uow.departments().search(term, &DETAIL)?;
        Ok(departments.iter().map(DepartmentView::from_entity).collect())
    }

    /// Every department with its live members, members carrying their
    /// manager names.
    pub fn get_departments_with_employees(&self) -> ServiceResult<Vec<DepartmentWithEmployees>> {
        let departments = self
            .uow
            .departments()
            .get_all(&Query::new().include_paths(DETAIL))?;
        let employees = self.uow.employees().get_all(
            &Query::new()
                .include(EmployeeInclude::Department)
                .include(EmployeeInclude::Manager),
        )?;

        let mut members: HashMap<DepartmentId, Vec<EmployeeView>> = HashMap::new();
        for employee in &employees {
            members
                .entry(employee.department_id)
                .or_default()
                .push(EmployeeView::from_entity(employee));
        }

        Ok(departments
            .iter()
            .map(|department| DepartmentWithEmployees {
                department: DepartmentView::from_entity(department),
                employees: members.remove(&department.id).unwrap_or_default(),
            })
            .collect())
    }

    /// Sets or clears the head of a department.
    pub fn assign_department_manager(
        &self,
        department_id: DepartmentId,
        manager_id: Option<EmployeeId>,
    ) -> ServiceResult<DepartmentView> {
        let mut department = self.uow.departments().get_by_id(&department_id)?;
        self.check_manager(manager_id)?;
        department.manager_id = manager_id;
        department.touch();

        self.uow.departments().update(&department)?;
        self.uow.save_changes()?;
        info!(
            "event=department_manager_assign module=service status=ok department_id={}",
            department_id
        );
        self.get_department_by_id(department_id)
    }

    fn check_manager(&self, manager_id: Option<EmployeeId>) -> ServiceResult<()> {
        match manager_id {
            Some(id) if self.uow.employees().find(&id, false)?.is_none() => Err(
                ServiceError::Validation(format!("manager {id} does not exist")),
            ),
            _ => Ok(()),
        }
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
