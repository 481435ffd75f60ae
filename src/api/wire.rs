//! Typed request and response bodies.
//!
//! Payloads are validated here, before anything reaches the catalog or
//! the evaluator. Optional fields are `Option` so that an absent reference
//! becomes a structured `INVALID_INPUT` error instead of a serde failure.

use serde::{Deserialize, Serialize};

use crate::assignment::{AssignmentRecord, AssignmentRequest, SlotResult};
use crate::eligibility::{parse_timestamp, EvaluationResult, InvalidInputError, TimeWindow};
use crate::error::{LabError, Result};
use crate::lab::{DeviceStatus, NewTask, TaskFilter, TaskStatus};

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub overdue: Option<bool>,
}

impl TaskQuery {
    pub fn into_filter(self) -> Result<TaskFilter> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.parse::<TaskStatus>().map_err(LabError::MalformedPayload)?),
        };
        Ok(TaskFilter {
            status,
            search: self.search,
            overdue: self.overdue,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskPayload {
    pub name: String,
    pub test_type: String,
    pub deadline: String,
    #[serde(default = "one")]
    pub device_count: u32,
    #[serde(default)]
    pub instructions: String,
}

fn one() -> u32 {
    1
}

impl CreateTaskPayload {
    pub fn into_new_task(self) -> Result<NewTask> {
        Ok(NewTask {
            deadline: parse_timestamp("deadline", &self.deadline)?,
            name: self.name,
            test_type: self.test_type,
            device_count: self.device_count,
            instructions: self.instructions,
        })
    }
}

/// One proposed (user, device, window) for a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidatePayload {
    pub user_id: Option<u64>,
    pub device_id: Option<u64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// A candidate payload with every reference present and timestamps parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCandidate {
    pub user_id: u64,
    pub device_id: u64,
    pub window: Option<TimeWindow>,
}

impl CandidatePayload {
    pub fn resolve(&self) -> std::result::Result<ResolvedCandidate, InvalidInputError> {
        let user_id = self
            .user_id
            .ok_or(InvalidInputError::MissingReference("user_id"))?;
        let device_id = self
            .device_id
            .ok_or(InvalidInputError::MissingReference("device_id"))?;
        let window = TimeWindow::from_parts(self.start_time.as_deref(), self.end_time.as_deref())?;
        Ok(ResolvedCandidate {
            user_id,
            device_id,
            window,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CandidatesPayload {
    #[serde(default)]
    pub candidates: Vec<CandidatePayload>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPayload {
    pub user_id: Option<u64>,
    #[serde(default)]
    pub device_ids: Vec<u64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub expected_revision: Option<u64>,
}

impl AssignPayload {
    pub fn into_request(self, task_id: u64) -> Result<AssignmentRequest> {
        let user_id = self
            .user_id
            .ok_or(InvalidInputError::MissingReference("user_id"))?;
        if self.device_ids.is_empty() {
            return Err(InvalidInputError::MissingReference("device_ids").into());
        }
        let window = TimeWindow::from_parts(self.start_time.as_deref(), self.end_time.as_deref())?;
        Ok(AssignmentRequest {
            task_id,
            user_id,
            device_ids: self.device_ids,
            window,
            expected_revision: self.expected_revision,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusPayload {
    pub status: String,
}

impl TaskStatusPayload {
    pub fn parse(&self) -> Result<TaskStatus> {
        self.status.parse().map_err(LabError::MalformedPayload)
    }
}

#[derive(Debug, Deserialize)]
pub struct DeviceStatusPayload {
    pub status: DeviceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub task_id: u64,
    pub user_id: u64,
    pub device_id: u64,
    /// Catalog revision the evaluation saw. Quote it back as
    /// `expected_revision` when assigning.
    pub revision: u64,
    #[serde(flatten)]
    pub result: EvaluationResult,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl EvaluationResponse {
    pub fn new(task_id: u64, candidate: ResolvedCandidate, revision: u64, result: EvaluationResult) -> Self {
        let messages = result
            .violations
            .iter()
            .map(|v| v.guidance().to_string())
            .collect();
        Self {
            task_id,
            user_id: candidate.user_id,
            device_id: candidate.device_id,
            revision,
            result,
            messages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub user_id: u64,
    pub device_id: u64,
    pub result: EvaluationResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub task_id: u64,
    pub revision: u64,
    pub results: Vec<BatchItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignResponse {
    pub assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<AssignmentRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<SlotResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_without_user_is_invalid() {
        let payload = CandidatePayload {
            user_id: None,
            device_id: Some(1),
            ..Default::default()
        };
        assert_eq!(
            payload.resolve().unwrap_err(),
            InvalidInputError::MissingReference("user_id")
        );
    }

    #[test]
    fn candidate_with_bad_timestamp_is_invalid() {
        let payload = CandidatePayload {
            user_id: Some(1),
            device_id: Some(1),
            start_time: Some("2024-01-18T09:00".to_string()),
            end_time: Some("soon".to_string()),
        };
        assert!(matches!(
            payload.resolve().unwrap_err(),
            InvalidInputError::MalformedTimestamp { field: "end_time", .. }
        ));
    }

    #[test]
    fn task_query_all_means_no_status() {
        let filter = TaskQuery {
            status: Some("all".to_string()),
            search: None,
            overdue: None,
        }
        .into_filter()
        .unwrap();
        assert!(filter.status.is_none());

        let err = TaskQuery {
            status: Some("sleeping".to_string()),
            search: None,
            overdue: None,
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_PAYLOAD");
    }

    #[test]
    fn assign_payload_requires_devices() {
        let payload = AssignPayload {
            user_id: Some(1),
            device_ids: vec![],
            start_time: None,
            end_time: None,
            expected_revision: None,
        };
        assert_eq!(payload.into_request(2).unwrap_err().code(), "INVALID_INPUT");
    }

    #[test]
    fn evaluation_response_flattens_result() {
        let candidate = ResolvedCandidate {
            user_id: 1,
            device_id: 2,
            window: None,
        };
        let response = EvaluationResponse::new(
            7,
            candidate,
            3,
            EvaluationResult::from_violations(vec![crate::eligibility::Violation::DeviceUnavailable]),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["eligible"], false);
        assert_eq!(json["violations"][0], "DEVICE_UNAVAILABLE");
        assert_eq!(json["messages"][0], "Device is not available");
        assert_eq!(json["revision"], 3);
    }
}
