use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::eligibility::{evaluate, validate_task, EvaluationResult, InvalidInputError, TimeWindow};
use crate::error::{LabError, Result};
use crate::lab::{Catalog, DeviceStatus, Task, TaskStatus, User};
use crate::session::{Role, Session};

/// A request to hand a task to a user on one device per required slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRequest {
    pub task_id: u64,
    pub user_id: u64,
    pub device_ids: Vec<u64>,
    pub window: Option<TimeWindow>,
    /// Catalog revision the caller evaluated against, if it wants the
    /// commit refused when anything changed since.
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: Uuid,
    pub task_id: u64,
    pub user_id: u64,
    pub device_ids: Vec<u64>,
    pub window: Option<TimeWindow>,
    pub assigned_by: u64,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotResult {
    pub device_id: u64,
    pub result: EvaluationResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Committed(AssignmentRecord),
    /// Nothing was changed. Every slot is listed, eligible or not.
    Rejected { task_id: u64, slots: Vec<SlotResult> },
}

impl AssignmentOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, AssignmentOutcome::Committed(_))
    }
}

/// Two bookings of one device collide unless both are windowed and the
/// windows are disjoint. A booking without a window holds the whole device.
fn bookings_collide(a: Option<&TimeWindow>, b: Option<&TimeWindow>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.overlaps(b),
        _ => true,
    }
}

/// Leaders only hand work to members of their own group.
fn check_group(session: &Session, user: &User) -> Result<()> {
    if session.role != Role::Leader {
        return Ok(());
    }
    match session.group_id {
        Some(group) if user.group_id == Some(group) => Ok(()),
        _ => Err(LabError::Forbidden(format!(
            "leader {} cannot assign user {} outside their group",
            session.user_id, user.id
        ))),
    }
}

/// Commits eligible assignments and drives the task lifecycle.
#[derive(Debug, Default)]
pub struct Dispatcher {
    records: HashMap<u64, AssignmentRecord>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluate `request` against the current catalog and, if every
    /// device slot is eligible and free for the requested window, apply it.
    ///
    /// A windowed booking leaves device status alone so that the same device
    /// can be booked for other, disjoint windows. An open-ended booking
    /// marks its devices `Reserved`.
    pub fn assign(
        &mut self,
        catalog: &mut Catalog,
        session: &Session,
        request: AssignmentRequest,
    ) -> Result<AssignmentOutcome> {
        if !session.role.can_assign() {
            return Err(LabError::Forbidden(format!(
                "role {} cannot assign tasks",
                session.role
            )));
        }
        if let Some(expected) = request.expected_revision {
            if expected != catalog.revision() {
                return Err(LabError::StaleSnapshot {
                    expected,
                    current: catalog.revision(),
                });
            }
        }

        let task = catalog.task(request.task_id)?;
        if task.status != TaskStatus::Unassigned {
            return Err(LabError::TaskNotAssignable {
                task_id: task.id,
                status: task.status,
            });
        }
        validate_task(task)?;

        let mut seen = HashSet::new();
        if let Some(dup) = request.device_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(InvalidInputError::DuplicateDevice(*dup).into());
        }
        if request.device_ids.len() != task.device_count as usize {
            return Err(LabError::DeviceCountMismatch {
                task_id: task.id,
                expected: task.device_count,
                got: request.device_ids.len(),
            });
        }

        let user = catalog.user(request.user_id)?;
        check_group(session, user)?;
        let mut slots = Vec::with_capacity(request.device_ids.len());
        for &device_id in &request.device_ids {
            let device = catalog.device(device_id)?;
            let result = evaluate(task, user, device, request.window.as_ref())?;
            slots.push(SlotResult { device_id, result });
        }

        if slots.iter().any(|s| !s.result.eligible) {
            tracing::info!(
                task_id = request.task_id,
                user_id = request.user_id,
                "Assignment rejected"
            );
            return Ok(AssignmentOutcome::Rejected {
                task_id: request.task_id,
                slots,
            });
        }

        for &device_id in &request.device_ids {
            let holder = catalog
                .bookings(device_id)
                .into_iter()
                .find(|t| bookings_collide(t.window.as_ref(), request.window.as_ref()));
            if let Some(holder) = holder {
                tracing::info!(
                    task_id = request.task_id,
                    device_id,
                    held_by = holder.id,
                    "Assignment refused: device already booked"
                );
                return Err(LabError::ReservationConflict {
                    device_id,
                    task_id: holder.id,
                });
            }
        }

        if request.window.is_none() {
            for &device_id in &request.device_ids {
                catalog.device_mut(device_id)?.status = DeviceStatus::Reserved;
            }
        }
        catalog.user_mut(request.user_id)?.active_tasks += 1;
        let task = catalog.task_mut(request.task_id)?;
        task.status = TaskStatus::Assigned;
        task.assigned_user = Some(request.user_id);
        task.assigned_devices = request.device_ids.clone();
        task.window = request.window;
        catalog.bump_revision();

        let record = AssignmentRecord {
            id: Uuid::new_v4(),
            task_id: request.task_id,
            user_id: request.user_id,
            device_ids: request.device_ids,
            window: request.window,
            assigned_by: session.user_id,
            assigned_at: Utc::now(),
        };
        tracing::info!(
            assignment_id = %record.id,
            task_id = record.task_id,
            user_id = record.user_id,
            devices = ?record.device_ids,
            "Task assigned"
        );
        self.records.insert(record.task_id, record.clone());
        Ok(AssignmentOutcome::Committed(record))
    }

    /// Move a task along its lifecycle, reserving or releasing devices.
    ///
    /// Members may only start or finish work assigned to themselves.
    pub fn update_status(
        &mut self,
        catalog: &mut Catalog,
        session: &Session,
        task_id: u64,
        next: TaskStatus,
    ) -> Result<Task> {
        let task = catalog.task(task_id)?;
        let from = task.status;

        if !session.role.can_assign() {
            let own = task.assigned_user == Some(session.user_id);
            let allowed = matches!(
                next,
                TaskStatus::InProgress | TaskStatus::Completed | TaskStatus::Failed
            );
            if !own || !allowed {
                return Err(LabError::Forbidden(format!(
                    "member {} cannot move task {task_id} to {next}",
                    session.user_id
                )));
            }
        }
        if !from.can_transition_to(next) {
            return Err(LabError::InvalidTransition {
                task_id,
                from,
                to: next,
            });
        }

        let devices = task.assigned_devices.clone();
        let assignee = task.assigned_user;
        let releasing =
            next.is_terminal() && matches!(from, TaskStatus::Assigned | TaskStatus::InProgress);
        // Devices another running task still occupies stay occupied on release.
        let shared: HashSet<u64> = devices
            .iter()
            .copied()
            .filter(|&device_id| {
                catalog
                    .bookings(device_id)
                    .iter()
                    .any(|t| t.id != task_id && t.status == TaskStatus::InProgress)
            })
            .collect();

        for device_id in devices {
            let Ok(device) = catalog.device_mut(device_id) else {
                tracing::warn!(task_id, device_id, "Assigned device no longer exists");
                continue;
            };
            if next == TaskStatus::InProgress
                && matches!(device.status, DeviceStatus::Reserved | DeviceStatus::Available)
            {
                device.status = DeviceStatus::Occupied;
            } else if releasing && device.status.is_held() && !shared.contains(&device_id) {
                device.status = DeviceStatus::Available;
            }
        }
        if releasing {
            if let Some(user_id) = assignee {
                if let Ok(user) = catalog.user_mut(user_id) {
                    user.active_tasks = user.active_tasks.saturating_sub(1);
                }
            }
        }

        let task = catalog.task_mut(task_id)?;
        task.status = next;
        let updated = task.clone();
        catalog.bump_revision();

        tracing::info!(task_id, from = %from, to = %next, by = session.user_id, "Task status changed");
        Ok(updated)
    }

    /// The most recent assignment committed for a task.
    pub fn record(&self, task_id: u64) -> Option<&AssignmentRecord> {
        self.records.get(&task_id)
    }

    pub fn records(&self) -> Vec<&AssignmentRecord> {
        let mut records: Vec<&AssignmentRecord> = self.records.values().collect();
        records.sort_by_key(|r| r.assigned_at);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{Device, Seed};
    use chrono::TimeZone;

    fn catalog() -> Catalog {
        let deadline = Utc.with_ymd_and_hms(2024, 1, 20, 17, 0, 0).unwrap();
        Catalog::from_seed(Seed {
            tasks: vec![Task::new(1, "Calibration".into(), "temperature".into(), deadline)],
            users: vec![User::new(1, "nobody").with_group(1)],
            devices: vec![Device::new(1, "Thermal Box A", DeviceStatus::Available)],
        })
        .unwrap()
    }

    #[test]
    fn untyped_task_fails_before_slot_count() {
        let mut catalog = catalog();
        let task = catalog.task_mut(1).unwrap();
        task.test_type = String::new();
        task.device_count = 0;

        let err = Dispatcher::new()
            .assign(
                &mut catalog,
                &Session::new(9, Role::Leader).with_group(1),
                AssignmentRequest {
                    task_id: 1,
                    user_id: 1,
                    device_ids: Vec::new(),
                    window: None,
                    expected_revision: None,
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LabError::InvalidInput(InvalidInputError::MissingRequiredType)
        ));
        assert_eq!(catalog.task(1).unwrap().status, TaskStatus::Unassigned);
        assert_eq!(catalog.user(1).unwrap().active_tasks, 0);
    }

    #[test]
    fn open_bookings_always_collide() {
        let at = |h| Utc.with_ymd_and_hms(2024, 1, 18, h, 0, 0).unwrap();
        let morning = TimeWindow::new(at(9), at(12));
        assert!(bookings_collide(None, Some(&morning)));
        assert!(bookings_collide(Some(&morning), None));
        assert!(!bookings_collide(
            Some(&morning),
            Some(&TimeWindow::new(at(12), at(13)))
        ));
    }
}
