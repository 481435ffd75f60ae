use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eligibility::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Unassigned,
    Assigned,
    #[serde(alias = "In Progress")]
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether a task may move from `self` to `next`.
    ///
    /// `Unassigned -> Assigned` is excluded: that edge is only taken by an
    /// assignment commit, never by a plain status update.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Unassigned, Cancelled)
                | (Assigned, InProgress)
                | (Assigned, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Unassigned => write!(f, "unassigned"),
            TaskStatus::Assigned => write!(f, "assigned"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "unassigned" => Ok(TaskStatus::Unassigned),
            "assigned" => Ok(TaskStatus::Assigned),
            "inprogress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("unknown task status: {s}")),
        }
    }
}

/// A unit of laboratory testing work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Skill / device-capability tag the work requires. Matched exactly.
    pub test_type: String,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    #[serde(default = "default_device_count")]
    pub device_count: u32,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub assigned_user: Option<u64>,
    #[serde(default)]
    pub assigned_devices: Vec<u64>,
    #[serde(default)]
    pub window: Option<TimeWindow>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_status() -> TaskStatus {
    TaskStatus::Unassigned
}

fn default_device_count() -> u32 {
    1
}

impl Task {
    pub fn new(id: u64, name: String, test_type: String, deadline: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            test_type,
            status: TaskStatus::Unassigned,
            deadline,
            device_count: 1,
            instructions: String::new(),
            assigned_user: None,
            assigned_devices: Vec::new(),
            window: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_device_count(mut self, device_count: u32) -> Self {
        self.device_count = device_count;
        self
    }

    pub fn with_instructions(mut self, instructions: String) -> Self {
        self.instructions = instructions;
        self
    }

    /// Overdue means past the deadline and not yet finished.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now && !self.status.is_terminal()
    }
}
