use orgledger_core::model::{now_epoch_ms, TaskPriority, TaskStatus};
use orgledger_core::service::ErrorKind;
use orgledger_core::{
    CurrentUser, DepartmentService, DepartmentView, EmployeeService, EmployeeView,
    LocalImageStore, Role, StorageConfig, TaskService, TaskView, UnitOfWork,
};
use rusqlite::Connection;
use uuid::Uuid;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

struct Org {
    uow: UnitOfWork,
    manager: Uuid,
    alice: Uuid,
    bob: Uuid,
}

/// One department: a manager with two direct reports, Alice and Bob.
fn org() -> Org {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let images = LocalImageStore::new(&StorageConfig::default());
    let department_id = DepartmentService::new(&uow)
        .create_department(&DepartmentView {
            name: "Delivery".to_string(),
            ..DepartmentView::default()
        })
        .unwrap()
        .id;

    let employees = EmployeeService::new(&uow, &images);
    let hire = |first: &str, manager_id: Option<Uuid>, user_id: &str| {
        employees
            .create_employee(
                &EmployeeView {
                    first_name: first.to_string(),
                    last_name: "Doe".to_string(),
                    salary_cents: 50_000,
                    department_id,
                    manager_id,
                    user_id: Some(user_id.to_string()),
                    ..EmployeeView::default()
                },
                None,
            )
            .unwrap()
            .id
            .unwrap()
    };
    let manager = hire("Maya", None, "u-maya");
    let alice = hire("Alice", Some(manager), "u-alice");
    let bob = hire("Bob", Some(manager), "u-bob");

    Org {
        uow,
        manager,
        alice,
        bob,
    }
}

fn titled(title: &str) -> TaskView {
    TaskView {
        title: title.to_string(),
        ..TaskView::default()
    }
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn create_task_writes_one_task_and_one_assignment() {
    let org = org();
    let tasks = TaskService::new(&org.uow);

    let created = tasks
        .create_task(&titled("Ship release"), org.alice, Some(org.manager))
        .unwrap();

    assert_eq!(created.status, TaskStatus::New);
    assert_eq!(created.employee_name.as_deref(), Some("Alice Doe"));
    assert_eq!(created.created_by_manager_name.as_deref(), Some("Maya Doe"));
    assert_eq!(created.assignee_ids, vec![org.alice]);

    let conn = org.uow.connection();
    assert_eq!(count(conn, "SELECT COUNT(*) FROM tasks;"), 1);
    assert_eq!(count(conn, "SELECT COUNT(*) FROM task_assignments;"), 1);
    let linked: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM task_assignments WHERE task_id = ?1 AND employee_id = ?2;",
            [created.id.unwrap().to_string(), org.alice.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(linked, 1);
}

#[test]
fn create_task_rejects_unknown_people_before_writing() {
    let org = org();
    let tasks = TaskService::new(&org.uow);

    let err = tasks
        .create_task(&titled("Nobody"), Uuid::new_v4(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = tasks
        .create_task(&titled("Ghost boss"), org.alice, Some(Uuid::new_v4()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut backwards = titled("Backwards");
    backwards.due_at = backwards.start_at - 1;
    let err = tasks.create_task(&backwards, org.alice, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(count(org.uow.connection(), "SELECT COUNT(*) FROM tasks;"), 0);
    assert!(!org.uow.in_transaction());
}

#[test]
fn failure_between_task_and_assignment_leaves_nothing_behind() {
    let org = org();
    org.uow
        .connection()
        .execute_batch(
            "CREATE TEMP TRIGGER fail_assignment BEFORE INSERT ON task_assignments
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        )
        .unwrap();

    let err = TaskService::new(&org.uow)
        .create_task(&titled("Doomed"), org.alice, Some(org.manager))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);

    let conn = org.uow.connection();
    assert_eq!(count(conn, "SELECT COUNT(*) FROM tasks;"), 0);
    assert_eq!(count(conn, "SELECT COUNT(*) FROM task_assignments;"), 0);
    assert!(!org.uow.in_transaction());
    assert!(!org.uow.has_pending_changes());
}

#[test]
fn delete_task_removes_assignments_first() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let task = tasks.create_task(&titled("Cleanup"), org.alice, None).unwrap();
    let id = task.id.unwrap();
    tasks.assign_task_to_employee(id, org.bob).unwrap();

    tasks.delete_task(id).unwrap();

    let conn = org.uow.connection();
    assert_eq!(count(conn, "SELECT COUNT(*) FROM task_assignments;"), 0);
    assert_eq!(tasks.get_task_by_id(id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(tasks.delete_task(id).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn assigning_the_same_pair_twice_conflicts() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let id = tasks.create_task(&titled("Pair"), org.alice, None).unwrap().id.unwrap();

    let view = tasks.assign_task_to_employee(id, org.bob).unwrap();
    assert_eq!(view.assignee_ids, vec![org.alice, org.bob]);

    let err = tasks.assign_task_to_employee(id, org.bob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(
        tasks.assign_task_to_employee(Uuid::new_v4(), org.bob).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        tasks.assign_task_to_employee(id, Uuid::new_v4()).unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn unassigning_a_missing_pair_is_not_found() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let id = tasks.create_task(&titled("Solo"), org.alice, None).unwrap().id.unwrap();

    let err = tasks.unassign_task_from_employee(id, org.bob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn unassigning_the_primary_hands_the_task_on() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let id = tasks.create_task(&titled("Relay"), org.alice, None).unwrap().id.unwrap();

    let err = tasks.unassign_task_from_employee(id, org.alice).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    tasks.assign_task_to_employee(id, org.bob).unwrap();
    let view = tasks.unassign_task_from_employee(id, org.alice).unwrap();
    assert_eq!(view.employee_id, Some(org.bob));
    assert_eq!(view.employee_name.as_deref(), Some("Bob Doe"));
    assert_eq!(view.assignee_ids, vec![org.bob]);
}

#[test]
fn deactivated_assignees_never_become_primary() {
    let org = org();
    let images = LocalImageStore::new(&StorageConfig::default());
    let tasks = TaskService::new(&org.uow);
    let id = tasks.create_task(&titled("Baton"), org.alice, None).unwrap().id.unwrap();
    tasks.assign_task_to_employee(id, org.bob).unwrap();
    EmployeeService::new(&org.uow, &images)
        .deactivate_employee(org.bob)
        .unwrap();

    let err = tasks.unassign_task_from_employee(id, org.alice).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(tasks.get_task_by_id(id).unwrap().employee_id, Some(org.alice));

    tasks.assign_task_to_employee(id, org.manager).unwrap();
    let view = tasks.unassign_task_from_employee(id, org.alice).unwrap();
    assert_eq!(view.employee_id, Some(org.manager));
    assert_eq!(view.employee_name.as_deref(), Some("Maya Doe"));
}

#[test]
fn reassignment_moves_the_assignment_row() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let id = tasks.create_task(&titled("Handover"), org.alice, None).unwrap().id.unwrap();

    let view = tasks.update_task_assignment(id, org.bob).unwrap();
    assert_eq!(view.employee_id, Some(org.bob));
    assert_eq!(view.employee_name.as_deref(), Some("Bob Doe"));
    assert_eq!(view.assignee_ids, vec![org.bob]);
    assert_eq!(count(org.uow.connection(), "SELECT COUNT(*) FROM task_assignments;"), 1);

    let same = tasks.update_task_assignment(id, org.bob).unwrap();
    assert_eq!(same.assignee_ids, vec![org.bob]);

    let err = tasks.update_task_assignment(id, Uuid::new_v4()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn tasks_by_manager_follow_the_current_manager() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let images = LocalImageStore::new(&StorageConfig::default());
    let employees = EmployeeService::new(&org.uow, &images);

    tasks.create_task(&titled("Alice work"), org.alice, Some(org.manager)).unwrap();
    tasks.create_task(&titled("Bob work"), org.bob, Some(org.manager)).unwrap();
    tasks.create_task(&titled("Maya work"), org.manager, None).unwrap();
    assert_eq!(tasks.get_tasks_by_manager(org.manager).unwrap().len(), 2);

    employees.assign_manager(org.bob, Some(org.alice)).unwrap();

    let under_maya = tasks.get_tasks_by_manager(org.manager).unwrap();
    assert_eq!(under_maya.len(), 1);
    assert_eq!(under_maya[0].title, "Alice work");
    let under_alice = tasks.get_tasks_by_manager(org.alice).unwrap();
    assert_eq!(under_alice.len(), 1);
    assert_eq!(under_alice[0].created_by_manager_id, Some(org.manager));
}

#[test]
fn status_changes_are_unrestricted_and_feed_overdue() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let now = now_epoch_ms();
    let mut late = titled("Late");
    late.start_at = now - 10 * DAY_MS;
    late.due_at = now - DAY_MS;
    late.priority = TaskPriority::High;
    let id = tasks.create_task(&late, org.alice, None).unwrap().id.unwrap();
    tasks.create_task(&titled("On time"), org.alice, None).unwrap();

    let overdue = tasks.get_overdue_tasks().unwrap();
    assert_eq!(overdue.len(), 1);
    assert!(overdue[0].is_overdue);
    assert_eq!(overdue[0].priority, TaskPriority::High);

    let done = tasks.update_task_status(id, TaskStatus::Completed).unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(tasks.get_overdue_tasks().unwrap().is_empty());

    let reopened = tasks.update_task_status(id, TaskStatus::New).unwrap();
    assert_eq!(reopened.status, TaskStatus::New);
    assert_eq!(tasks.get_tasks_by_status(TaskStatus::New).unwrap().len(), 2);
    assert_eq!(
        tasks.update_task_status(Uuid::new_v4(), TaskStatus::Delayed).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn update_task_keeps_the_assignee() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    let created = tasks.create_task(&titled("Draft"), org.alice, None).unwrap();

    let mut edit = created.clone();
    edit.title = "Final".to_string();
    edit.description = Some("Polished".to_string());
    edit.employee_id = Some(org.bob);
    edit.status = TaskStatus::InProgress;
    let updated = tasks.update_task(&edit).unwrap();

    assert_eq!(updated.title, "Final");
    assert_eq!(updated.description.as_deref(), Some("Polished"));
    assert_eq!(updated.status, TaskStatus::InProgress);
    assert_eq!(updated.employee_id, Some(org.alice));
    assert_eq!(tasks.get_tasks_by_employee(org.alice).unwrap().len(), 1);
    assert!(tasks.get_tasks_by_employee(org.bob).unwrap().is_empty());
}

#[test]
fn visibility_depends_on_role() {
    let org = org();
    let tasks = TaskService::new(&org.uow);
    tasks.create_task(&titled("Alice work"), org.alice, None).unwrap();
    tasks.create_task(&titled("Bob work"), org.bob, None).unwrap();
    tasks.create_task(&titled("Maya work"), org.manager, None).unwrap();

    let admin = CurrentUser::new("u-root", [Role::Admin]);
    assert_eq!(tasks.visible_tasks(&admin).unwrap().len(), 3);

    let maya = CurrentUser::new("u-maya", [Role::Manager, Role::Employee]);
    let titles: Vec<String> = tasks
        .visible_tasks(&maya)
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, ["Maya work", "Alice work", "Bob work"]);

    let alice = CurrentUser::new("u-alice", [Role::Employee]);
    let mine = tasks.visible_tasks(&alice).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Alice work");
}
