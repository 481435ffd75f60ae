//! Assignment eligibility.
//!
//! Decides whether a (task, user, device, window) pairing satisfies every
//! hard constraint, and names the ones it does not:
//!
//! 1. `MISSING_SKILL` - user lacks the task's test type
//! 2. `DEVICE_INCOMPATIBLE` - device does not support the test type
//! 3. `DEVICE_UNAUTHORIZED` - user may not operate the device
//! 4. `DEVICE_UNAVAILABLE` - device is not `Available`
//! 5. `DEADLINE_EXCEEDED` - window ends after the task deadline
//! 6. `INVALID_WINDOW` - window start is not before its end
//!
//! Evaluation reads its inputs and nothing else. Committing an eligible
//! assignment is the job of [`crate::assignment::Dispatcher`].

pub mod evaluator;
pub mod violation;
pub mod window;

pub use evaluator::{evaluate, evaluate_batch, validate_task, Candidate};
pub use violation::{EvaluationResult, InvalidInputError, Violation};
pub use window::{parse_timestamp, TimeWindow};
