//! Task record, status and priority.

use super::{
    check_length, now_epoch_ms, require_text, Assignment, Employee, EmployeeId, ValidationError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// Task lifecycle state.
///
/// Transitions are not restricted: any state may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    Completed,
    Delayed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        Self::New,
        Self::InProgress,
        Self::Completed,
        Self::Delayed,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Delayed => "delayed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// Whether work is still expected on a task in this state.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Task urgency; persisted as its numeric rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn rank(self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Unit of work handed to an employee.
///
/// `employee_id` names the primary assignee; the assignment rows hold the
/// full assignee set and are kept in step by the task workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub start_at: i64,
    pub due_at: i64,
    pub employee_id: EmployeeId,
    pub created_by_manager_id: Option<EmployeeId>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_employee: Option<Box<Employee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_manager: Option<Box<Employee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<Assignment>>,
}

impl Task {
    /// Creates a `New` task of medium priority.
    pub fn new(title: impl Into<String>, employee_id: EmployeeId, start_at: i64, due_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            status: TaskStatus::New,
            priority: TaskPriority::Medium,
            start_at,
            due_at,
            employee_id,
            created_by_manager_id: None,
            created_at: now_epoch_ms(),
            updated_at: None,
            assigned_employee: None,
            created_by_manager: None,
            assignments: None,
        }
    }

    /// Stamps `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Some(now_epoch_ms());
    }

    /// Past its due date while still open.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.status.is_open() && self.due_at < now_ms
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, TITLE_MAX_CHARS)?;
        if let Some(description) = &self.description {
            check_length("description", description, DESCRIPTION_MAX_CHARS)?;
        }
        if self.due_at < self.start_at {
            return Err(ValidationError::DueBeforeStart {
                start_at: self.start_at,
                due_at: self.due_at,
            });
        }
        Ok(())
    }
}
