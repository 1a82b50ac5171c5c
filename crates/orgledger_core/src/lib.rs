//! Core data-access layer for organisation records.
//! This crate is the single source of truth for business invariants:
//! departments, employees and their manager hierarchy, tasks and task
//! assignments, persisted through one generic repository and a unit of work.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;
pub mod uow;

pub use config::{ConfigError, CoreConfig, StorageConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::{
    Assignment, Department, DepartmentId, Employee, EmployeeId, Task, TaskId, TaskPriority,
    TaskStatus, ValidationError,
};
pub use repo::{Query, RepoError, RepoResult, Repository};
pub use service::{
    CurrentUser, DepartmentService, DepartmentView, DepartmentWithEmployees, EmployeeService,
    EmployeeView, Role, ServiceError, ServiceResult, TaskService, TaskView, UserContext,
};
pub use storage::{ImageStore, ImageUpload, LocalImageStore, StorageError};
pub use uow::UnitOfWork;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
