//! Employee use cases.
//!
//! # Responsibility
//! - Translate [`EmployeeView`] writes into entity mutations, leaving
//!   `image_path` and `is_active` under service control.
//! - Keep the manager graph acyclic and self-reference free.
//! - Coordinate profile images with the [`ImageStore`].
//!
//! # Invariants
//! - Soft delete (`deactivate_employee`) is the default removal path;
//!   `purge_employee` is the administrative hard delete and refuses while
//!   anything still references the employee.
//! - A stored image is removed again when the row write that would have
//!   referenced it fails.

use super::department_service::non_blank;
use super::hierarchy::{direct_reports, would_create_cycle};
use super::view::EmployeeView;
use super::{Role, ServiceError, ServiceResult, UserContext};
use crate::model::{DepartmentId, Employee, EmployeeId};
use crate::repo::entity::uuid_value;
use crate::repo::{EmployeeInclude, Query, RepoResult, Repository};
use crate::storage::{ImageStore, ImageUpload};
use crate::uow::UnitOfWork;
use log::{info, warn};

const DISPLAY: [EmployeeInclude; 2] = [EmployeeInclude::Department, EmployeeInclude::Manager];

pub struct EmployeeService<'a, S: ImageStore + ?Sized> {
    uow: &'a UnitOfWork,
    images: &'a S,
}

impl<'a, S: ImageStore + ?Sized> EmployeeService<'a, S> {
    pub fn new(uow: &'a UnitOfWork, images: &'a S) -> Self {
        Self { uow, images }
    }

    pub fn get_all_employees(&self) -> ServiceResult<Vec<EmployeeView>> {
        let employees = self
            .uow
            .employees()
            .get_all(&Query::new().include_paths(DISPLAY))?;
        Ok(to_views(&employees))
    }

    pub fn get_employee_by_id(&self, id: EmployeeId) -> ServiceResult<EmployeeView> {
        let employee = self
            .uow
            .employees()
            .get_first_or_default(&Query::for_key(&id).include_paths(DISPLAY))?
            .ok_or_else(|| ServiceError::not_found("employee", id))?;
        Ok(EmployeeView::from_entity(&employee))
    }

    pub fn get_employee_by_user_id(&self, user_id: &str) -> ServiceResult<EmployeeView> {
        self.uow
            .employees()
            .find_by_user_id(user_id, &DISPLAY)?
            .map(|employee| EmployeeView::from_entity(&employee))
            .ok_or_else(|| ServiceError::not_found("employee", format!("user_id={user_id}")))
    }

    /// Creates an active employee, storing `image` first when given.
    pub fn create_employee(
        &self,
        view: &EmployeeView,
        image: Option<&ImageUpload>,
    ) -> ServiceResult<EmployeeView> {
        let department_id = self.require_department(view.department_id)?;
        if let Some(manager_id) = view.manager_id {
            self.require_active_employee(manager_id, "manager")?;
        }

        let mut employee = Employee::new(
            view.first_name.trim(),
            view.last_name.trim(),
            view.salary_cents,
            department_id,
        );
        employee.user_id = non_blank(view.user_id.as_deref());
        employee.manager_id = view.manager_id;
        employee.validate()?;

        if let Some(upload) = image {
            employee.image_path = Some(self.images.store(&upload.file_name, &upload.bytes)?);
        }
        if let Err(err) = self.persist(|| self.uow.employees().add(&employee)) {
            self.discard_image(employee.image_path.as_deref());
            return Err(err);
        }

        info!(
            "event=employee_create module=service status=ok employee_id={} department_id={} with_image={}",
            employee.id,
            department_id,
            employee.image_path.is_some()
        );
        self.get_employee_by_id(employee.id)
    }

    /// Replaces the editable fields. A new `image` replaces the stored one,
    /// which is deleted once the row is saved. The manager is re-checked only
    /// when it changes.
    pub fn update_employee(
        &self,
        view: &EmployeeView,
        image: Option<&ImageUpload>,
    ) -> ServiceResult<EmployeeView> {
        let id = view
            .id
            .ok_or_else(|| ServiceError::Validation("employee id is required".to_string()))?;
        let mut employee = self.uow.employees().get_by_id(&id)?;
        let department_id = self.require_department(view.department_id)?;
        if let Some(manager_id) = view.manager_id.filter(|m| Some(*m) != employee.manager_id) {
            self.check_manager_for(id, manager_id)?;
        }

        employee.first_name = view.first_name.trim().to_string();
        employee.last_name = view.last_name.trim().to_string();
        employee.salary_cents = view.salary_cents;
        employee.user_id = non_blank(view.user_id.as_deref());
        employee.department_id = department_id;
        employee.manager_id = view.manager_id;
        employee.touch();
        employee.validate()?;

        let previous_image = employee.image_path.clone();
        if let Some(upload) = image {
            employee.image_path = Some(self.images.store(&upload.file_name, &upload.bytes)?);
        }
        if let Err(err) = self.persist(|| self.uow.employees().update(&employee)) {
            if image.is_some() {
                self.discard_image(employee.image_path.as_deref());
            }
            return Err(err);
        }
        if image.is_some() {
            self.discard_image(previous_image.as_deref());
        }

        info!(
            "event=employee_update module=service status=ok employee_id={}",
            id
        );
        self.get_employee_by_id(id)
    }

    /// Soft delete: the row stays, hidden from default reads.
    pub fn deactivate_employee(&self, id: EmployeeId) -> ServiceResult<()> {
        let mut employee = self.uow.employees().get_by_id(&id)?;
        employee.deactivate();
        self.persist(|| self.uow.employees().update(&employee))?;
        info!(
            "event=employee_deactivate module=service status=ok employee_id={}",
            id
        );
        Ok(())
    }

    /// Hard delete of an active or inactive employee.
    pub fn purge_employee(&self, id: EmployeeId) -> ServiceResult<()> {
        let employees = self.uow.employees();
        let employee = employees
            .find(&id, true)?
            .ok_or_else(|| ServiceError::not_found("employee", id))?;

        let dependents = employees.count_dependents(id)?;
        if !dependents.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "employee {id} still has {} subordinate(s), manages {} department(s) and is referenced by {} task(s)",
                dependents.subordinates, dependents.managed_departments, dependents.tasks
            )));
        }

        self.persist(|| employees.delete(&employee))?;
        self.discard_image(employee.image_path.as_deref());
        info!(
            "event=employee_purge module=service status=ok employee_id={}",
            id
        );
        Ok(())
    }

    pub fn get_employees_by_department(
        &self,
        department_id: DepartmentId,
    ) -> ServiceResult<Vec<EmployeeView>> {
        self.uow.departments().get_by_id(&department_id)?;
        let employees = self
            .uow
            .employees()
            .list_by_department(department_id, &DISPLAY)?;
        Ok(to_views(&employees))
    }

    /// Direct reports only; an employee two levels down is not included.
    pub fn get_subordinates(&self, manager_id: EmployeeId) -> ServiceResult<Vec<EmployeeView>> {
        self.uow.employees().get_by_id(&manager_id)?;
        Ok(to_views(&direct_reports(self.uow, manager_id, &DISPLAY)?))
    }

    /// Case-insensitive match on first name, last name or department name.
    pub fn search_employees(&self, term: &str) -> ServiceResult<Vec<EmployeeView>> {
        if term.trim().is_empty() {
            return self.get_all_employees();
        }
        Ok(to_views(&self.uow.employees().search(term, &DISPLAY)?))
    }

    /// Sets or clears the manager of `employee_id`.
    pub fn assign_manager(
        &self,
        employee_id: EmployeeId,
        manager_id: Option<EmployeeId>,
    ) -> ServiceResult<EmployeeView> {
        let mut employee = self.uow.employees().get_by_id(&employee_id)?;
        if let Some(manager_id) = manager_id {
            self.check_manager_for(employee_id, manager_id)?;
        }
        employee.manager_id = manager_id;
        employee.touch();
        self.persist(|| self.uow.employees().update(&employee))?;
        info!(
            "event=employee_manager_assign module=service status=ok employee_id={}",
            employee_id
        );
        self.get_employee_by_id(employee_id)
    }

    /// Whether `employee_id` has at least one active direct report.
    pub fn is_manager(&self, employee_id: EmployeeId) -> ServiceResult<bool> {
        self.uow.employees().get_by_id(&employee_id)?;
        let reports = self
            .uow
            .employees()
            .count(&Query::new().where_eq("manager_id", uuid_value(employee_id)))?;
        Ok(reports > 0)
    }

    /// Employee record mapped to the signed-in user.
    pub fn current_employee(&self, ctx: &dyn UserContext) -> ServiceResult<EmployeeView> {
        self.get_employee_by_user_id(ctx.user_id())
    }

    /// Employees the caller may hand tasks to: everyone for admins, the
    /// caller and their direct reports for managers, otherwise the caller
    /// alone.
    pub fn assignable_employees(&self, ctx: &dyn UserContext) -> ServiceResult<Vec<EmployeeView>> {
        if ctx.has_role(Role::Admin) {
            return self.get_all_employees();
        }
        let me = self.current_employee(ctx)?;
        if !ctx.has_role(Role::Manager) {
            return Ok(vec![me]);
        }
        let manager_id = me.id.ok_or_else(|| ServiceError::not_found("employee", ctx.user_id()))?;
        let mut views = vec![me];
        views.extend(to_views(&direct_reports(self.uow, manager_id, &DISPLAY)?));
        Ok(views)
    }

    fn persist(&self, buffer: impl FnOnce() -> RepoResult<()>) -> ServiceResult<()> {
        buffer()?;
        self.uow.save_changes()?;
        Ok(())
    }

    fn require_department(&self, department_id: Option<DepartmentId>) -> ServiceResult<DepartmentId> {
        let id = department_id
            .ok_or_else(|| ServiceError::Validation("department is required".to_string()))?;
        if self.uow.departments().find(&id, false)?.is_none() {
            return Err(ServiceError::Validation(format!(
                "department {id} does not exist"
            )));
        }
        Ok(id)
    }

    fn require_active_employee(&self, id: EmployeeId, role: &str) -> ServiceResult<()> {
        if self.uow.employees().find(&id, false)?.is_none() {
            return Err(ServiceError::Validation(format!("{role} {id} does not exist")));
        }
        Ok(())
    }

    fn check_manager_for(&self, employee_id: EmployeeId, manager_id: EmployeeId) -> ServiceResult<()> {
        if employee_id == manager_id {
            return Err(ServiceError::Validation(format!(
                "employee {employee_id} cannot manage itself"
            )));
        }
        self.require_active_employee(manager_id, "manager")?;
        if would_create_cycle(self.uow, employee_id, manager_id)? {
            return Err(ServiceError::Validation(format!(
                "manager {manager_id} reports to employee {employee_id}; the change would create a cycle"
            )));
        }
        Ok(())
    }

    fn discard_image(&self, reference: Option<&str>) {
        let Some(reference) = reference else {
            return;
        };
        if let Err(err) = self.images.delete(reference) {
            warn!(
                "event=image_cleanup module=service status=error error={}",
                err
            );
        }
    }
}

fn to_views(employees: &[Employee]) -> Vec<EmployeeView> {
    employees.iter().map(EmployeeView::from_entity).collect()
}
