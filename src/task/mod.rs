mod job;
mod state;

pub use job::{RetryConfig, StageOutcome, SubmissionTask, TaskReport, TaskStatus};
pub use state::{State, StateMachine, Transition};
