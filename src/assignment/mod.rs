pub mod dispatcher;

pub use dispatcher::{
    AssignmentOutcome, AssignmentRecord, AssignmentRequest, Dispatcher, SlotResult,
};
