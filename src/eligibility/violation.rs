use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A hard constraint that a proposed assignment failed.
///
/// Variants are declared in check order; `EvaluationResult::violations`
/// always lists them in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Violation {
    MissingSkill,
    DeviceIncompatible,
    DeviceUnauthorized,
    DeviceUnavailable,
    DeadlineExceeded,
    InvalidWindow,
}

impl Violation {
    /// Stable machine-readable code, identical to the serialized form.
    pub fn code(&self) -> &'static str {
        match self {
            Violation::MissingSkill => "MISSING_SKILL",
            Violation::DeviceIncompatible => "DEVICE_INCOMPATIBLE",
            Violation::DeviceUnauthorized => "DEVICE_UNAUTHORIZED",
            Violation::DeviceUnavailable => "DEVICE_UNAVAILABLE",
            Violation::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Violation::InvalidWindow => "INVALID_WINDOW",
        }
    }

    /// Short guidance suitable for showing next to an assignment form.
    pub fn guidance(&self) -> &'static str {
        match self {
            Violation::MissingSkill => "User lacks required skill",
            Violation::DeviceIncompatible => "Device doesn't support test type",
            Violation::DeviceUnauthorized => "User not authorized for this device",
            Violation::DeviceUnavailable => "Device is not available",
            Violation::DeadlineExceeded => "Proposed window ends after the task deadline",
            Violation::InvalidWindow => "Start time must be before end time",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub eligible: bool,
    pub violations: Vec<Violation>,
}

impl EvaluationResult {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            eligible: violations.is_empty(),
            violations,
        }
    }

    pub fn eligible() -> Self {
        Self::from_violations(Vec::new())
    }

    pub fn has(&self, violation: Violation) -> bool {
        self.violations.contains(&violation)
    }
}

/// Caller contract errors. These are never reported as violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInputError {
    #[error("task has no required test type")]
    MissingRequiredType,

    #[error("task requires at least one device")]
    ZeroDeviceCount,

    #[error("device {0} has no name")]
    MissingDeviceName(u64),

    #[error("missing required reference: {0}")]
    MissingReference(&'static str),

    #[error("malformed timestamp in {field}: {value:?}")]
    MalformedTimestamp { field: &'static str, value: String },

    #[error("device {0} listed more than once")]
    DuplicateDevice(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form_matches_code() {
        for v in [
            Violation::MissingSkill,
            Violation::DeviceIncompatible,
            Violation::DeviceUnauthorized,
            Violation::DeviceUnavailable,
            Violation::DeadlineExceeded,
            Violation::InvalidWindow,
        ] {
            let json = serde_json::to_string(&v).unwrap();
            assert_eq!(json, format!("\"{}\"", v.code()));
        }
    }

    #[test]
    fn eligible_iff_no_violations() {
        assert!(EvaluationResult::eligible().eligible);
        let r = EvaluationResult::from_violations(vec![Violation::InvalidWindow]);
        assert!(!r.eligible);
        assert!(r.has(Violation::InvalidWindow));
        assert!(!r.has(Violation::MissingSkill));
    }

    #[test]
    fn declaration_order_is_check_order() {
        assert!(Violation::MissingSkill < Violation::DeviceIncompatible);
        assert!(Violation::DeviceUnavailable < Violation::DeadlineExceeded);
        assert!(Violation::DeadlineExceeded < Violation::InvalidWindow);
    }
}
