use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{StageOutcome, SubmissionTask, TaskStatus};
use crate::error::FailureKind;

/// The stages of a submission task.
///
/// Each task flows through: SUBMIT → PUBLISH → END
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Submit,
    Publish,
    End,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Submit => write!(f, "SUBMIT"),
            State::Publish => write!(f, "PUBLISH"),
            State::End => write!(f, "END"),
        }
    }
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the next state.
    Next(State),
    /// Requeue the current stage after the backoff delay.
    Retry { state: State, reason: FailureKind },
    /// The task has completed (successfully or with a terminal failure).
    Complete(StageOutcome),
}

/// Drives a `SubmissionTask` through the stage chain.
pub struct StateMachine;

impl StateMachine {
    /// Compute the next transition for the task based on its current state
    /// and the outcome of the attempt that just ran.
    ///
    /// - Success in `Submit` advances to `Publish`, success in `Publish`
    ///   advances to `End`. The retry budget resets on every advance.
    /// - A retryable failure retries while the stage's budget lasts,
    ///   otherwise completes with failure.
    /// - A fatal failure completes immediately.
    /// - `End` is terminal and always returns `Complete`.
    pub fn next(task: &mut SubmissionTask, outcome: StageOutcome) -> Transition {
        let transition = match task.state {
            State::Submit => match &outcome {
                StageOutcome::Success => Transition::Next(State::Publish),
                StageOutcome::Failure(kind) => Self::handle_failure(task, kind.clone()),
            },
            State::Publish => match &outcome {
                StageOutcome::Success => Transition::Next(State::End),
                StageOutcome::Failure(kind) => Self::handle_failure(task, kind.clone()),
            },
            State::End => Transition::Complete(StageOutcome::Success),
        };

        match &transition {
            Transition::Next(next_state) => {
                task.state_history.push(task.state);
                task.state = *next_state;
                task.retry_count = 0;
                task.status = if *next_state == State::End {
                    TaskStatus::Completed
                } else {
                    TaskStatus::InProgress
                };
            }
            Transition::Retry { state, .. } => {
                // State stays the same; retry count was already incremented
                // in handle_failure.
                task.state_history.push(*state);
            }
            Transition::Complete(outcome) => {
                task.state_history.push(task.state);
                match outcome {
                    StageOutcome::Success => task.status = TaskStatus::Completed,
                    StageOutcome::Failure(kind) => {
                        task.status = TaskStatus::Failed;
                        task.failure = Some(kind.clone());
                    }
                }
            }
        }

        transition
    }

    fn handle_failure(task: &mut SubmissionTask, kind: FailureKind) -> Transition {
        if kind.is_fatal() {
            return Transition::Complete(StageOutcome::Failure(kind));
        }
        task.retry_count += 1;
        if task.retry_count <= task.retry_config.max_retries {
            Transition::Retry {
                state: task.state,
                reason: kind,
            }
        } else {
            Transition::Complete(StageOutcome::Failure(kind))
        }
    }
}
