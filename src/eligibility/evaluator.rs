use crate::eligibility::violation::{EvaluationResult, InvalidInputError, Violation};
use crate::eligibility::window::TimeWindow;
use crate::lab::{Device, DeviceStatus, Task, User};

/// One (user, device, window) pairing proposed for a task.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub user: &'a User,
    pub device: &'a Device,
    pub window: Option<TimeWindow>,
}

impl<'a> Candidate<'a> {
    pub fn new(user: &'a User, device: &'a Device, window: Option<TimeWindow>) -> Self {
        Self {
            user,
            device,
            window,
        }
    }
}

/// Reject a task that lacks its required test type or device slots.
pub fn validate_task(task: &Task) -> Result<(), InvalidInputError> {
    if task.test_type.trim().is_empty() {
        return Err(InvalidInputError::MissingRequiredType);
    }
    if task.device_count == 0 {
        return Err(InvalidInputError::ZeroDeviceCount);
    }
    Ok(())
}

fn check_device(device: &Device) -> Result<(), InvalidInputError> {
    if device.name.trim().is_empty() {
        return Err(InvalidInputError::MissingDeviceName(device.id));
    }
    Ok(())
}

/// Collect every failed constraint for a single device slot.
///
/// All checks run; none short-circuits another. Window checks only run
/// when a window is proposed.
fn collect_violations(
    task: &Task,
    user: &User,
    device: &Device,
    window: Option<&TimeWindow>,
) -> Vec<Violation> {
    let required = task.test_type.as_str();
    let mut violations = Vec::new();

    if !user.has_skill(required) {
        violations.push(Violation::MissingSkill);
    }
    if !device.supports(required) {
        violations.push(Violation::DeviceIncompatible);
    }
    if !user.may_operate(&device.name) {
        violations.push(Violation::DeviceUnauthorized);
    }
    if device.status != DeviceStatus::Available {
        violations.push(Violation::DeviceUnavailable);
    }
    if let Some(window) = window {
        if window.end > task.deadline {
            violations.push(Violation::DeadlineExceeded);
        }
        if !window.is_ordered() {
            violations.push(Violation::InvalidWindow);
        }
    }

    violations
}

/// Decide whether `user` may take `task` on `device` within `window`.
///
/// Business-rule failures come back inside the result. Only a malformed
/// task or device is an error.
pub fn evaluate(
    task: &Task,
    user: &User,
    device: &Device,
    window: Option<&TimeWindow>,
) -> Result<EvaluationResult, InvalidInputError> {
    validate_task(task)?;
    check_device(device)?;

    let result = EvaluationResult::from_violations(collect_violations(task, user, device, window));
    tracing::debug!(
        task_id = task.id,
        user_id = user.id,
        device_id = device.id,
        eligible = result.eligible,
        violations = ?result.violations,
        "Evaluated assignment"
    );
    Ok(result)
}

/// Evaluate each candidate independently, preserving input order.
///
/// Input is validated up front so that a malformed candidate yields an
/// error rather than a partial list.
pub fn evaluate_batch(
    task: &Task,
    candidates: &[Candidate<'_>],
) -> Result<Vec<(usize, EvaluationResult)>, InvalidInputError> {
    validate_task(task)?;
    for candidate in candidates {
        check_device(candidate.device)?;
    }

    candidates
        .iter()
        .enumerate()
        .map(|(index, c)| {
            evaluate(task, c.user, c.device, c.window.as_ref()).map(|result| (index, result))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn task() -> Task {
        Task::new(
            1,
            "Thermal stress".into(),
            "temperature".into(),
            Utc.with_ymd_and_hms(2024, 1, 20, 17, 0, 0).unwrap(),
        )
    }

    fn user() -> User {
        User::new(1, "ylchen")
            .with_skills(["temperature", "electrical"])
            .with_authorized_devices(["Thermal Box A"])
    }

    fn device(status: DeviceStatus) -> Device {
        Device::new(1, "Thermal Box A", status).with_supported_types(["temperature"])
    }

    #[test]
    fn everything_fails_at_once_in_check_order() {
        let task = task();
        let user = User::new(2, "nobody");
        let dev = Device::new(9, "Oscilloscope A", DeviceStatus::Maintenance);
        let end = task.deadline + Duration::hours(1);
        let window = TimeWindow::new(end, end);

        let result = evaluate(&task, &user, &dev, Some(&window)).unwrap();
        assert_eq!(
            result.violations,
            vec![
                Violation::MissingSkill,
                Violation::DeviceIncompatible,
                Violation::DeviceUnauthorized,
                Violation::DeviceUnavailable,
                Violation::DeadlineExceeded,
                Violation::InvalidWindow,
            ]
        );
        assert!(!result.eligible);
    }

    #[test]
    fn window_ending_exactly_at_deadline_is_fine() {
        let task = task();
        let window = TimeWindow::new(task.deadline - Duration::hours(8), task.deadline);
        let result = evaluate(&task, &user(), &device(DeviceStatus::Available), Some(&window)).unwrap();
        assert_eq!(result, EvaluationResult::eligible());
    }

    #[test]
    fn whitespace_type_is_missing() {
        let mut task = task();
        task.test_type = "   ".into();
        let err = evaluate(&task, &user(), &device(DeviceStatus::Available), None).unwrap_err();
        assert_eq!(err, InvalidInputError::MissingRequiredType);
    }

    #[test]
    fn zero_device_count_is_rejected() {
        let task = task().with_device_count(0);
        let err = evaluate(&task, &user(), &device(DeviceStatus::Available), None).unwrap_err();
        assert_eq!(err, InvalidInputError::ZeroDeviceCount);
    }

    #[test]
    fn nameless_device_in_batch_fails_whole_batch() {
        let task = task();
        let u = user();
        let good = device(DeviceStatus::Available);
        let nameless = Device::new(5, "", DeviceStatus::Available);
        let candidates = [Candidate::new(&u, &good, None), Candidate::new(&u, &nameless, None)];
        assert_eq!(
            evaluate_batch(&task, &candidates).unwrap_err(),
            InvalidInputError::MissingDeviceName(5)
        );
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(evaluate_batch(&task(), &[]).unwrap().is_empty());
    }
}
