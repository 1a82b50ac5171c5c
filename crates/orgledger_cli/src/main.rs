//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `orgledger_core` linkage and run one workflow end to end.
//! - Keep output deterministic apart from generated ids.
//!
//! Usage: `orgledger_cli [DATABASE_PATH]`. Without a path the run uses an
//! in-memory database. `ORGLEDGER_LOG_DIR` (absolute) enables file logging.

use log::info;
use orgledger_core::{
    core_version, init_from_config, CoreConfig, DepartmentService, DepartmentView, EmployeeService,
    EmployeeView, LocalImageStore, TaskService, TaskView,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("orgledger_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut config = CoreConfig {
        database_path: std::env::args_os().nth(1).map(Into::into),
        ..CoreConfig::default()
    };
    if let Some(dir) = std::env::var_os("ORGLEDGER_LOG_DIR") {
        config.log_dir = Some(dir.into());
    }
    config.validate()?;
    if init_from_config(&config)? {
        info!("event=cli_start module=cli status=ok log_level={}", config.log_level);
    }

    let uow = config.open_unit_of_work()?;
    let images = LocalImageStore::new(&config.storage);
    let departments = DepartmentService::new(&uow);
    let employees = EmployeeService::new(&uow, &images);
    let tasks = TaskService::new(&uow);

    let department = departments.create_department(&DepartmentView {
        name: "Operations".to_string(),
        ..DepartmentView::default()
    })?;
    let lead = employees.create_employee(
        &EmployeeView {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            salary_cents: 950_000,
            department_id: department.id,
            ..EmployeeView::default()
        },
        None,
    )?;
    let report = employees.create_employee(
        &EmployeeView {
            first_name: "Alan".to_string(),
            last_name: "Turing".to_string(),
            salary_cents: 720_000,
            department_id: department.id,
            manager_id: lead.id,
            ..EmployeeView::default()
        },
        None,
    )?;
    let (Some(lead_id), Some(report_id), Some(department_id)) = (lead.id, report.id, department.id)
    else {
        return Err("created records are missing ids".into());
    };

    let task = tasks.create_task(
        &TaskView {
            title: "Quarterly inventory".to_string(),
            ..TaskView::default()
        },
        report_id,
        Some(lead_id),
    )?;
    let rollup = departments.get_department_by_id(department_id)?;
    let team_tasks = tasks.get_tasks_by_manager(lead_id)?;
    info!(
        "event=cli_smoke module=cli status=ok department_id={} task_id={:?}",
        department_id, task.id
    );

    println!("orgledger_core version={}", core_version());
    println!(
        "department={} employees={} total_salary_cents={}",
        rollup.name, rollup.employee_count, rollup.total_salary_cents
    );
    println!(
        "task={} assignee={} team_tasks={}",
        task.title,
        task.employee_name.as_deref().unwrap_or("-"),
        team_tasks.len()
    );
    Ok(())
}
