use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::State;
use crate::comment::{AttachmentDescriptor, CommentBody};
use crate::error::FailureKind;

/// The result of executing one attempt of a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    Success,
    Failure(FailureKind),
}

/// Tracks the lifecycle status of a submission task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Bounded-attempt retry policy applied to each stage independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries per stage before the task is marked failed.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given retry attempt using exponential backoff.
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        self.base_delay_ms.saturating_mul(factor)
    }
}

/// One comment submission moving through the Submit → Publish chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionTask {
    pub id: String,
    pub body: CommentBody,
    pub attachments: Vec<AttachmentDescriptor>,
    /// Storage key the tracking record is written to.
    pub metadata_key: String,
    pub status: TaskStatus,
    pub state: State,
    pub state_history: Vec<State>,
    /// Retries consumed by the current stage; reset when a stage succeeds.
    pub retry_count: u32,
    pub submit_attempts: u32,
    pub publish_attempts: u32,
    pub retry_config: RetryConfig,
    pub tracking_number: Option<String>,
    pub failure: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionTask {
    pub fn new(
        body: CommentBody,
        attachments: Vec<AttachmentDescriptor>,
        metadata_key: String,
        retry_config: RetryConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            body,
            attachments,
            metadata_key,
            status: TaskStatus::Pending,
            state: State::Submit,
            state_history: Vec::new(),
            retry_count: 0,
            submit_attempts: 0,
            publish_attempts: 0,
            retry_config,
            tracking_number: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Count one execution of the current stage.
    pub fn record_attempt(&mut self) {
        match self.state {
            State::Submit => self.submit_attempts += 1,
            State::Publish => self.publish_attempts += 1,
            State::End => {}
        }
        self.updated_at = Utc::now();
    }
}

/// Structured report produced when a submission task finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    pub metadata_key: String,
    pub status: TaskStatus,
    pub state_transitions: Vec<State>,
    pub submit_attempts: u32,
    pub publish_attempts: u32,
    pub max_retries: u32,
    pub attachment_count: usize,
    pub tracking_number: Option<String>,
    pub failure: Option<FailureKind>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl TaskReport {
    /// Generate a report from a completed or failed task.
    pub fn from_task(task: &SubmissionTask) -> Self {
        let now = Utc::now();
        let duration = now - task.created_at;
        let mut transitions = task.state_history.clone();
        transitions.push(task.state);

        Self {
            task_id: task.id.clone(),
            metadata_key: task.metadata_key.clone(),
            status: task.status,
            state_transitions: transitions,
            submit_attempts: task.submit_attempts,
            publish_attempts: task.publish_attempts,
            max_retries: task.retry_config.max_retries,
            attachment_count: task.attachments.len(),
            tracking_number: task.tracking_number.clone(),
            failure: task.failure.clone(),
            started_at: task.created_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
