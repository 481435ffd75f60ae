use thiserror::Error;

use crate::eligibility::InvalidInputError;
use crate::lab::TaskStatus;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Task not found: {0}")]
    TaskNotFound(u64),

    #[error("User not found: {0}")]
    UserNotFound(u64),

    #[error("Device not found: {0}")]
    DeviceNotFound(u64),

    #[error("No assignment recorded for task {0}")]
    AssignmentNotFound(u64),

    #[error("Missing or invalid session context")]
    MissingSession,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Task {task_id} cannot be assigned while {status}")]
    TaskNotAssignable { task_id: u64, status: TaskStatus },

    #[error("Task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: u64,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {task_id} needs {expected} device(s), got {got}")]
    DeviceCountMismatch { task_id: u64, expected: u32, got: usize },

    #[error("Device {device_id} is already booked by task {task_id} for an overlapping period")]
    ReservationConflict { device_id: u64, task_id: u64 },

    #[error("Snapshot is stale: expected revision {expected}, current is {current}")]
    StaleSnapshot { expected: u64, current: u64 },

    #[error("Seed error: {0}")]
    Seed(#[from] serde_json::Error),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("No {0} ids left")]
    IdsExhausted(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LabError {
    /// Stable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            LabError::InvalidInput(_) => "INVALID_INPUT",
            LabError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            LabError::TaskNotFound(_) => "TASK_NOT_FOUND",
            LabError::UserNotFound(_) => "USER_NOT_FOUND",
            LabError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            LabError::AssignmentNotFound(_) => "ASSIGNMENT_NOT_FOUND",
            LabError::MissingSession => "MISSING_SESSION",
            LabError::Forbidden(_) => "FORBIDDEN",
            LabError::TaskNotAssignable { .. } => "TASK_NOT_ASSIGNABLE",
            LabError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LabError::DeviceCountMismatch { .. } => "DEVICE_COUNT_MISMATCH",
            LabError::ReservationConflict { .. } => "RESERVATION_CONFLICT",
            LabError::StaleSnapshot { .. } => "STALE_SNAPSHOT",
            LabError::Seed(_) | LabError::InvalidSeed(_) => "SEED_ERROR",
            LabError::IdsExhausted(_) => "IDS_EXHAUSTED",
            LabError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, LabError>;
