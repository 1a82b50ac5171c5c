//! Task use cases and the assignment workflow.
//!
//! # Responsibility
//! - Create, update and delete tasks together with their assignment rows.
//! - Keep `tasks.employee_id` (primary assignee) inside the task's
//!   assignment set across assign, unassign and reassign.
//!
//! # Invariants
//! - Task create, delete, unassign and reassign each commit as one
//!   transaction; on failure no task or assignment change is observable.
//! - Referenced employees are verified before any transaction is opened.
//! - Assigning an existing `(task, employee)` pair is a conflict, not a
//!   no-op.
//! - Status transitions are unrestricted.

use super::department_service::non_blank;
use super::hierarchy::tasks_of_direct_reports;
use super::view::TaskView;
use super::{Role, ServiceError, ServiceResult, UserContext};
use crate::model::{now_epoch_ms, Assignment, Employee, EmployeeId, Task, TaskId, TaskStatus};
use crate::repo::{Query, Repository, TaskInclude};
use crate::uow::UnitOfWork;
use log::{info, warn};
use std::collections::HashSet;
use std::time::Instant;

const DETAIL: [TaskInclude; 3] = [
    TaskInclude::AssignedEmployee,
    TaskInclude::CreatedByManager,
    TaskInclude::Assignments,
];

pub struct TaskService<'a> {
    uow: &'a UnitOfWork,
}

impl<'a> TaskService<'a> {
    pub fn new(uow: &'a UnitOfWork) -> Self {
        Self { uow }
    }

    /// Creates a task and its first assignment atomically.
    ///
    /// The assignee (and the creating manager, when given) must be active
    /// employees; that is checked before the transaction starts.
    pub fn create_task(
        &self,
        input: &TaskView,
        employee_id: EmployeeId,
        manager_id: Option<EmployeeId>,
    ) -> ServiceResult<TaskView> {
        let started_at = Instant::now();
        let employee = self.require_employee(employee_id, "employee")?;
        let manager = manager_id
            .map(|id| self.require_employee(id, "manager"))
            .transpose()?;

        let mut task = Task::new(input.title.trim(), employee_id, input.start_at, input.due_at);
        task.description = non_blank(input.description.as_deref());
        task.status = input.status;
        task.priority = input.priority;
        task.created_by_manager_id = manager_id;
        task.validate()?;
        let assignment = Assignment::new(task.id, employee_id);

        let outcome = self.uow.run_in_transaction(|uow| -> ServiceResult<()> {
            uow.tasks().add(&task)?;
            uow.assignments().add(&assignment)?;
            Ok(())
        });
        if let Err(err) = outcome {
            warn!(
                "event=task_create module=service status=rolled_back employee_id={} duration_ms={} error={}",
                employee_id,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        info!(
            "event=task_create module=service status=ok task_id={} employee_id={} duration_ms={}",
            task.id,
            employee_id,
            started_at.elapsed().as_millis()
        );
        task.assigned_employee = Some(Box::new(employee));
        task.created_by_manager = manager.map(Box::new);
        task.assignments = Some(vec![assignment]);
        Ok(TaskView::from_entity(&task))
    }

    pub fn get_all_tasks(&self) -> ServiceResult<Vec<TaskView>> {
        let tasks = self.uow.tasks().get_all(&Query::new().include_paths(DETAIL))?;
        Ok(to_views(&tasks))
    }

    pub fn get_task_by_id(&self, id: TaskId) -> ServiceResult<TaskView> {
        let task = self
            .uow
            .tasks()
            .get_first_or_default(&Query::for_key(&id).include_paths(DETAIL))?
            .ok_or_else(|| ServiceError::not_found("task", id))?;
        Ok(TaskView::from_entity(&task))
    }

    /// Replaces the descriptive fields and schedule. Assignees are changed
    /// only through the assignment operations.
    pub fn update_task(&self, view: &TaskView) -> ServiceResult<TaskView> {
        let id = view
            .id
            .ok_or_else(|| ServiceError::Validation("task id is required".to_string()))?;
        let mut task = self.uow.tasks().get_by_id(&id)?;
        task.title = view.title.trim().to_string();
        task.description = non_blank(view.description.as_deref());
        task.status = view.status;
        task.priority = view.priority;
        task.start_at = view.start_at;
        task.due_at = view.due_at;
        task.touch();

        self.uow.tasks().update(&task)?;
        self.uow.save_changes()?;
        info!("event=task_update module=service status=ok task_id={}", id);
        self.get_task_by_id(id)
    }

    /// Removes the task's assignments, then the task, in one transaction.
    pub fn delete_task(&self, id: TaskId) -> ServiceResult<()> {
        let task = self.uow.tasks().get_by_id(&id)?;
        let removed = self.uow.run_in_transaction(|uow| -> ServiceResult<usize> {
            let assignments = uow.assignments().list_by_task(id, &[])?;
            for assignment in &assignments {
                uow.assignments().delete(assignment)?;
            }
            uow.tasks().delete(&task)?;
            Ok(assignments.len())
        })?;
        info!(
            "event=task_delete module=service status=ok task_id={} assignments_removed={}",
            id, removed
        );
        Ok(())
    }

    /// Tasks with an assignment for `employee_id`.
    pub fn get_tasks_by_employee(&self, employee_id: EmployeeId) -> ServiceResult<Vec<TaskView>> {
        self.uow.employees().get_by_id(&employee_id)?;
        let tasks = self.uow.tasks().list_by_assignee(employee_id, &DETAIL)?;
        Ok(to_views(&tasks))
    }

    /// Tasks assigned to the current direct reports of `manager_id`.
    pub fn get_tasks_by_manager(&self, manager_id: EmployeeId) -> ServiceResult<Vec<TaskView>> {
        self.uow.employees().get_by_id(&manager_id)?;
        Ok(to_views(&tasks_of_direct_reports(self.uow, manager_id, &DETAIL)?))
    }

    pub fn get_tasks_by_status(&self, status: TaskStatus) -> ServiceResult<Vec<TaskView>> {
        Ok(to_views(&self.uow.tasks().list_by_status(status, &DETAIL)?))
    }

    /// Open tasks whose due date has passed.
    pub fn get_overdue_tasks(&self) -> ServiceResult<Vec<TaskView>> {
        Ok(to_views(
            &self.uow.tasks().list_overdue(now_epoch_ms(), &DETAIL)?,
        ))
    }

    /// Sets any status from any status and stamps `updated_at`.
    pub fn update_task_status(&self, id: TaskId, status: TaskStatus) -> ServiceResult<TaskView> {
        let mut task = self.uow.tasks().get_by_id(&id)?;
        let previous = task.status;
        task.status = status;
        task.touch();
        self.uow.tasks().update(&task)?;
        self.uow.save_changes()?;
        info!(
            "event=task_status module=service status=ok task_id={} from={} to={}",
            id,
            previous.as_str(),
            status.as_str()
        );
        self.get_task_by_id(id)
    }

    /// Adds `employee_id` as a further assignee of `task_id`.
    pub fn assign_task_to_employee(
        &self,
        task_id: TaskId,
        employee_id: EmployeeId,
    ) -> ServiceResult<TaskView> {
        self.uow.tasks().get_by_id(&task_id)?;
        self.require_employee(employee_id, "employee")?;
        if self.uow.assignments().get_pair(task_id, employee_id)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "task {task_id} is already assigned to employee {employee_id}"
            )));
        }

        self.uow
            .assignments()
            .add(&Assignment::new(task_id, employee_id))?;
        self.uow.save_changes()?;
        info!(
            "event=task_assign module=service status=ok task_id={} employee_id={}",
            task_id, employee_id
        );
        self.get_task_by_id(task_id)
    }

    /// Removes one assignee. Removing the primary assignee hands the task to
    /// the earliest remaining active one; when none is left the removal is
    /// refused.
    pub fn unassign_task_from_employee(
        &self,
        task_id: TaskId,
        employee_id: EmployeeId,
    ) -> ServiceResult<TaskView> {
        let mut task = self.uow.tasks().get_by_id(&task_id)?;
        let assignments = self.uow.assignments().list_by_task(task_id, &[])?;
        let target = assignments
            .iter()
            .find(|assignment| assignment.employee_id == employee_id)
            .ok_or_else(|| {
                ServiceError::not_found(
                    "assignment",
                    format!("task={task_id} employee={employee_id}"),
                )
            })?;
        let last_assignee = || {
            ServiceError::Conflict(format!(
                "employee {employee_id} is the last assignee of task {task_id}; delete or reassign the task instead"
            ))
        };
        let successor = if task.employee_id == employee_id {
            let mut active = None;
            for candidate in assignments
                .iter()
                .filter(|assignment| assignment.employee_id != employee_id)
            {
                if self.uow.employees().find(&candidate.employee_id, false)?.is_some() {
                    active = Some(candidate.employee_id);
                    break;
                }
            }
            Some(active.ok_or_else(last_assignee)?)
        } else if assignments.len() < 2 {
            return Err(last_assignee());
        } else {
            None
        };

        self.uow.run_in_transaction(|uow| -> ServiceResult<()> {
            uow.assignments().delete(target)?;
            if let Some(successor) = successor {
                task.employee_id = successor;
                task.touch();
                uow.tasks().update(&task)?;
            }
            Ok(())
        })?;
        info!(
            "event=task_unassign module=service status=ok task_id={} employee_id={}",
            task_id, employee_id
        );
        self.get_task_by_id(task_id)
    }

    /// Moves the primary assignment of `task_id` to `new_employee_id`.
    pub fn update_task_assignment(
        &self,
        task_id: TaskId,
        new_employee_id: EmployeeId,
    ) -> ServiceResult<TaskView> {
        let mut task = self.uow.tasks().get_by_id(&task_id)?;
        self.require_employee(new_employee_id, "employee")?;
        if task.employee_id == new_employee_id {
            return self.get_task_by_id(task_id);
        }

        let assignments = self.uow.assignments().list_by_task(task_id, &[])?;
        let previous_id = task.employee_id;
        self.uow.run_in_transaction(|uow| -> ServiceResult<()> {
            if let Some(current) = assignments
                .iter()
                .find(|assignment| assignment.employee_id == previous_id)
            {
                uow.assignments().delete(current)?;
            }
            if !assignments
                .iter()
                .any(|assignment| assignment.employee_id == new_employee_id)
            {
                uow.assignments()
                    .add(&Assignment::new(task_id, new_employee_id))?;
            }
            task.employee_id = new_employee_id;
            task.touch();
            uow.tasks().update(&task)?;
            Ok(())
        })?;
        info!(
            "event=task_reassign module=service status=ok task_id={} from={} to={}",
            task_id, previous_id, new_employee_id
        );
        self.get_task_by_id(task_id)
    }

    /// Tasks the caller may see: all for admins; own tasks plus those of
    /// direct reports for managers; own tasks otherwise.
    pub fn visible_tasks(&self, ctx: &dyn UserContext) -> ServiceResult<Vec<TaskView>> {
        if ctx.has_role(Role::Admin) {
            return self.get_all_tasks();
        }
        let me = self
            .uow
            .employees()
            .find_by_user_id(ctx.user_id(), &[])?
            .ok_or_else(|| {
                ServiceError::not_found("employee", format!("user_id={}", ctx.user_id()))
            })?;

        let mut tasks = self.uow.tasks().list_by_assignee(me.id, &DETAIL)?;
        if ctx.has_role(Role::Manager) {
            let mut seen: HashSet<TaskId> = tasks.iter().map(|task| task.id).collect();
            for task in tasks_of_direct_reports(self.uow, me.id, &DETAIL)? {
                if seen.insert(task.id) {
                    tasks.push(task);
                }
            }
        }
        Ok(to_views(&tasks))
    }

    fn require_employee(&self, id: EmployeeId, role: &str) -> ServiceResult<Employee> {
        self.uow
            .employees()
            .find(&id, false)?
            .ok_or_else(|| ServiceError::Validation(format!("{role} {id} does not exist")))
    }
}

fn to_views(tasks: &[Task]) -> Vec<TaskView> {
    tasks.iter().map(TaskView::from_entity).collect()
}
