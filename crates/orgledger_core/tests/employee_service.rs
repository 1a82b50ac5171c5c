use orgledger_core::service::ErrorKind;
use orgledger_core::{
    CurrentUser, DepartmentService, DepartmentView, EmployeeService, EmployeeView, ImageUpload,
    LocalImageStore, Role, StorageConfig, TaskService, TaskView, UnitOfWork,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

struct Fixture {
    uow: UnitOfWork,
    images: LocalImageStore,
    upload_dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let images = LocalImageStore::new(&StorageConfig {
            upload_dir: upload_dir.path().to_path_buf(),
            max_image_bytes: 64,
            ..StorageConfig::default()
        });
        Self {
            uow: UnitOfWork::open_in_memory().unwrap(),
            images,
            upload_dir,
        }
    }

    fn employees(&self) -> EmployeeService<'_, LocalImageStore> {
        EmployeeService::new(&self.uow, &self.images)
    }

    fn department(&self, name: &str) -> Uuid {
        DepartmentService::new(&self.uow)
            .create_department(&DepartmentView {
                name: name.to_string(),
                ..DepartmentView::default()
            })
            .unwrap()
            .id
            .unwrap()
    }

    fn hire(&self, first: &str, department_id: Uuid, manager_id: Option<Uuid>) -> Uuid {
        self.employees()
            .create_employee(&person(first, department_id, manager_id), None)
            .unwrap()
            .id
            .unwrap()
    }

    fn stored_file(&self, reference: &str) -> PathBuf {
        self.upload_dir
            .path()
            .join(Path::new(reference.trim_start_matches("/uploads/")))
    }
}

fn person(first: &str, department_id: Uuid, manager_id: Option<Uuid>) -> EmployeeView {
    EmployeeView {
        first_name: first.to_string(),
        last_name: "Smith".to_string(),
        salary_cents: 100_000,
        department_id: Some(department_id),
        manager_id,
        ..EmployeeView::default()
    }
}

#[test]
fn create_then_get_resolves_department_and_manager_names() {
    let fx = Fixture::new();
    let ops = fx.department("Operations");
    let boss = fx.hire("Olga", ops, None);

    let created = fx
        .employees()
        .create_employee(&person("Ivan", ops, Some(boss)), None)
        .unwrap();
    let loaded = fx.employees().get_employee_by_id(created.id.unwrap()).unwrap();

    assert_eq!(loaded.department_name.as_deref(), Some("Operations"));
    assert_eq!(loaded.manager_name.as_deref(), Some("Olga Smith"));
    assert!(loaded.is_active);
    assert_eq!(loaded, created);
}

#[test]
fn missing_department_or_manager_is_a_validation_error() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");

    let err = fx
        .employees()
        .create_employee(&person("Nobody", Uuid::new_v4(), None), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = fx
        .employees()
        .create_employee(&person("Orphan", ops, Some(Uuid::new_v4())), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut unplaced = person("Unplaced", ops, None);
    unplaced.department_id = None;
    let err = fx.employees().create_employee(&unplaced, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn subordinates_are_direct_reports_only() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");
    let top = fx.hire("Top", ops, None);
    let middle = fx.hire("Middle", ops, Some(top));
    fx.hire("Bottom", ops, Some(middle));

    let reports = fx.employees().get_subordinates(top).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, Some(middle));
    assert_eq!(reports[0].manager_name.as_deref(), Some("Top Smith"));

    assert!(fx.employees().is_manager(top).unwrap());
    assert!(!fx.employees().get_subordinates(middle).unwrap().is_empty());
    assert_eq!(
        fx.employees().get_subordinates(Uuid::new_v4()).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn manager_changes_that_close_a_cycle_are_rejected() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");
    let a = fx.hire("A", ops, None);
    let b = fx.hire("B", ops, Some(a));
    let c = fx.hire("C", ops, Some(b));

    let err = fx.employees().assign_manager(a, Some(c)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = fx.employees().assign_manager(a, Some(a)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut view = fx.employees().get_employee_by_id(b).unwrap();
    view.manager_id = Some(c);
    let err = fx.employees().update_employee(&view, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let moved = fx.employees().assign_manager(c, Some(a)).unwrap();
    assert_eq!(moved.manager_name.as_deref(), Some("A Smith"));
    let cleared = fx.employees().assign_manager(c, None).unwrap();
    assert_eq!(cleared.manager_id, None);
}

#[test]
fn purge_is_blocked_while_dependents_exist() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");
    let boss = fx.hire("Boss", ops, None);
    let worker = fx.hire("Worker", ops, Some(boss));

    let err = fx.employees().purge_employee(boss).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let tasks = TaskService::new(&fx.uow);
    let task = tasks
        .create_task(
            &TaskView {
                title: "Inventory".to_string(),
                ..TaskView::default()
            },
            worker,
            None,
        )
        .unwrap();
    let err = fx.employees().purge_employee(worker).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    tasks.delete_task(task.id.unwrap()).unwrap();
    fx.employees().deactivate_employee(worker).unwrap();
    fx.employees().purge_employee(worker).unwrap();
    fx.employees().purge_employee(boss).unwrap();

    assert_eq!(
        fx.employees().get_employee_by_id(boss).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        fx.employees().purge_employee(worker).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn deactivated_employees_disappear_from_reads() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");
    let keep = fx.hire("Keep", ops, None);
    let leave = fx.hire("Leave", ops, None);

    fx.employees().deactivate_employee(leave).unwrap();

    let all = fx.employees().get_all_employees().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, Some(keep));
    assert_eq!(
        fx.employees().get_employee_by_id(leave).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn reports_of_a_deactivated_manager_stay_editable() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");
    let lead = fx.hire("Lead", ops, None);
    let report = fx.hire("Report", ops, Some(lead));
    let other = fx.hire("Other", ops, None);
    fx.employees().deactivate_employee(lead).unwrap();

    let mut view = fx.employees().get_employee_by_id(report).unwrap();
    assert_eq!(view.manager_id, Some(lead));
    view.salary_cents = 120_000;
    let updated = fx.employees().update_employee(&view, None).unwrap();
    assert_eq!(updated.salary_cents, 120_000);
    assert_eq!(updated.manager_id, Some(lead));

    let mut moved = fx.employees().get_employee_by_id(other).unwrap();
    moved.manager_id = Some(lead);
    let err = fx.employees().update_employee(&moved, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn images_are_stored_replaced_and_removed() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");

    let created = fx
        .employees()
        .create_employee(
            &person("Pic", ops, None),
            Some(&ImageUpload::new("me.JPG", b"first".to_vec())),
        )
        .unwrap();
    let first_ref = created.image_path.clone().unwrap();
    assert!(fx.stored_file(&first_ref).exists());

    let mut edit = created.clone();
    edit.image_path = Some("/uploads/forged.png".to_string());
    edit.last_name = "Jones".to_string();
    let unchanged = fx.employees().update_employee(&edit, None).unwrap();
    assert_eq!(unchanged.image_path.as_deref(), Some(first_ref.as_str()));

    let replaced = fx
        .employees()
        .update_employee(&edit, Some(&ImageUpload::new("new.png", b"second".to_vec())))
        .unwrap();
    let second_ref = replaced.image_path.clone().unwrap();
    assert_ne!(second_ref, first_ref);
    assert!(!fx.stored_file(&first_ref).exists());
    assert!(fx.stored_file(&second_ref).exists());

    fx.employees().purge_employee(created.id.unwrap()).unwrap();
    assert!(!fx.stored_file(&second_ref).exists());
}

#[test]
fn rejected_images_leave_no_employee_behind() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");

    let err = fx
        .employees()
        .create_employee(
            &person("Big", ops, None),
            Some(&ImageUpload::new("huge.png", vec![0u8; 65])),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = fx
        .employees()
        .create_employee(
            &person("Script", ops, None),
            Some(&ImageUpload::new("run.sh", b"#!".to_vec())),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(fx.employees().get_all_employees().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(fx.upload_dir.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[test]
fn user_mapping_drives_current_employee_and_assignable_set() {
    let fx = Fixture::new();
    let ops = fx.department("Ops");

    let mut manager = person("Mona", ops, None);
    manager.user_id = Some("user-mona".to_string());
    let manager_id = fx.employees().create_employee(&manager, None).unwrap().id.unwrap();

    let mut report = person("Rick", ops, Some(manager_id));
    report.user_id = Some("user-rick".to_string());
    fx.employees().create_employee(&report, None).unwrap();
    fx.hire("Other", ops, None);

    let mut duplicate = person("Copy", ops, None);
    duplicate.user_id = Some("user-rick".to_string());
    let err = fx.employees().create_employee(&duplicate, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let mona = CurrentUser::new("user-mona", [Role::Manager]);
    assert_eq!(fx.employees().current_employee(&mona).unwrap().id, Some(manager_id));
    let names: Vec<String> = fx
        .employees()
        .assignable_employees(&mona)
        .unwrap()
        .iter()
        .map(EmployeeView::full_name)
        .collect();
    assert_eq!(names, ["Mona Smith", "Rick Smith"]);

    let rick = CurrentUser::new("user-rick", [Role::Employee]);
    assert_eq!(fx.employees().assignable_employees(&rick).unwrap().len(), 1);

    let admin = CurrentUser::new("user-admin", [Role::Admin]);
    assert_eq!(fx.employees().assignable_employees(&admin).unwrap().len(), 3);

    let stranger = CurrentUser::new("user-none", [Role::Employee]);
    assert_eq!(
        fx.employees().current_employee(&stranger).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn search_covers_names_and_department() {
    let fx = Fixture::new();
    let finance = fx.department("Finance");
    let other = fx.department("Other");
    fx.hire("Fiona", other, None);
    fx.hire("Zed", finance, None);
    fx.hire("Yan", other, None);

    let found = fx.employees().search_employees("fin").unwrap();
    let names: Vec<String> = found.iter().map(EmployeeView::full_name).collect();
    assert_eq!(names, ["Zed Smith"]);
    assert_eq!(fx.employees().search_employees("").unwrap().len(), 3);
}
