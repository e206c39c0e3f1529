use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::attachments::AttachmentAssembler;
use crate::error::FailureKind;
use crate::intake::{IntakeClient, SubmissionOutcome, SubmissionReceipt};
use crate::publish::MetadataPublisher;
use crate::render::Renderer;
use crate::task::{StageOutcome, State, StateMachine, SubmissionTask, TaskReport, TaskStatus, Transition};

/// Drives submission tasks through Submit → Publish → End.
pub struct SubmissionOrchestrator {
    renderer: Renderer,
    assembler: AttachmentAssembler,
    intake: IntakeClient,
    publisher: MetadataPublisher,
}

impl SubmissionOrchestrator {
    pub fn new(
        renderer: Renderer,
        assembler: AttachmentAssembler,
        intake: IntakeClient,
        publisher: MetadataPublisher,
    ) -> Self {
        Self {
            renderer,
            assembler,
            intake,
            publisher,
        }
    }

    /// Run a task to completion, returning its report.
    ///
    /// Each stage retries on its own budget. The receipt from a successful
    /// submit is carried to the publish stage; a failed publish never
    /// resubmits the comment.
    pub async fn run(&self, task: &mut SubmissionTask) -> TaskReport {
        task.status = TaskStatus::InProgress;
        let mut receipt: Option<SubmissionReceipt> = None;

        loop {
            let stage = task.state;
            if stage == State::End {
                break;
            }
            task.record_attempt();

            let outcome = match stage {
                State::Submit => match self.submit_stage(task).await {
                    SubmissionOutcome::Success(accepted) => {
                        task.tracking_number = Some(accepted.tracking_number.clone());
                        receipt = Some(accepted);
                        StageOutcome::Success
                    }
                    SubmissionOutcome::Retryable { reason } => {
                        StageOutcome::Failure(FailureKind::Retryable(reason))
                    }
                    SubmissionOutcome::Fatal { reason } => StageOutcome::Failure(FailureKind::Fatal(reason)),
                },
                State::Publish => match &receipt {
                    Some(accepted) => match self.publisher.publish(accepted, &task.metadata_key).await {
                        Ok(()) => StageOutcome::Success,
                        Err(err) => StageOutcome::Failure(FailureKind::Retryable(err.to_string())),
                    },
                    None => StageOutcome::Failure(FailureKind::Fatal(
                        "publish stage reached without a submission receipt".into(),
                    )),
                },
                State::End => StageOutcome::Success,
            };

            match StateMachine::next(task, outcome) {
                Transition::Next(next) => {
                    debug!(from = %stage, to = %next, "stage complete");
                    if next == State::End {
                        break;
                    }
                }
                Transition::Retry { state, reason } => {
                    let delay_ms = task.retry_config.delay_for_attempt(task.retry_count);
                    warn!(
                        stage = %state,
                        attempt = task.retry_count,
                        max_retries = task.retry_config.max_retries,
                        delay_ms,
                        reason = reason.reason(),
                        "stage failed, retrying"
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                }
                Transition::Complete(StageOutcome::Failure(kind)) => {
                    error!(
                        stage = %stage,
                        metadata_key = %task.metadata_key,
                        tracking_number = task.tracking_number.as_deref(),
                        fatal = kind.is_fatal(),
                        reason = kind.reason(),
                        "submission task failed"
                    );
                    break;
                }
                Transition::Complete(StageOutcome::Success) => break,
            }
        }

        let report = TaskReport::from_task(task);
        if report.status == TaskStatus::Completed {
            info!(
                tracking_number = report.tracking_number.as_deref(),
                submit_attempts = report.submit_attempts,
                publish_attempts = report.publish_attempts,
                duration_ms = report.duration_ms,
                "submission task completed"
            );
        }
        report
    }

    // Every attempt renders and stages from scratch; both are released when
    // this returns.
    async fn submit_stage(&self, task: &SubmissionTask) -> SubmissionOutcome {
        let mut document = match self.renderer.render(&task.body).await {
            Ok(document) => document,
            Err(err) if err.is_fatal() => return SubmissionOutcome::fatal(err.to_string()),
            Err(err) => return SubmissionOutcome::retryable(err.to_string()),
        };

        let mut session = match self.assembler.stage(&task.attachments).await {
            Ok(session) => session,
            Err(err) => return SubmissionOutcome::retryable(err.to_string()),
        };

        self.intake
            .submit(&task.body, &mut document, session.attachments_mut())
            .await
    }
}

/// Handle to an enqueued task.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: String,
    handle: JoinHandle<TaskReport>,
}

impl TaskHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Wait for the task to finish.
    pub async fn wait(self) -> Result<TaskReport, JoinError> {
        self.handle.await
    }
}

/// In-process worker pool. At most `concurrency` tasks run at once; the rest
/// wait for a permit.
#[derive(Clone)]
pub struct Pipeline {
    orchestrator: Arc<SubmissionOrchestrator>,
    permits: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(orchestrator: SubmissionOrchestrator, concurrency: usize) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Accept a task and start it in the background. Must be called from
    /// within a tokio runtime.
    pub fn enqueue(&self, mut task: SubmissionTask) -> TaskHandle {
        let orchestrator = Arc::clone(&self.orchestrator);
        let permits = Arc::clone(&self.permits);
        let task_id = task.id.clone();
        let span = info_span!("task", task_id = %task_id, metadata_key = %task.metadata_key);

        debug!(task_id = %task_id, attachments = task.attachments.len(), "task enqueued");
        let handle = tokio::spawn(
            async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await.ok();
                orchestrator.run(&mut task).await
            }
            .instrument(span),
        );

        TaskHandle { task_id, handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{AttachmentDescriptor, CommentBody};
    use crate::config::{IntakeConfig, RendererConfig, StorageConfig};
    use crate::storage::S3Store;
    use crate::task::RetryConfig;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn orchestrator(server: &MockServer, converter: &str, root: &Path) -> SubmissionOrchestrator {
        let storage = StorageConfig {
            endpoint: server.uri(),
            bucket: "bucket".into(),
            access_key_id: "AKID".into(),
            secret_access_key: "secret".into(),
            ..StorageConfig::default()
        };
        let store = Arc::new(S3Store::new(&storage, Duration::from_secs(5)).unwrap());
        let renderer = Renderer::new(
            &RendererConfig {
                converter_path: PathBuf::from(converter),
                converter_args: Vec::new(),
                timeout_secs: 10,
            },
            Some(root.to_path_buf()),
        );
        let intake = IntakeClient::new(&IntakeConfig {
            url: format!("{}/comments", server.uri()),
            api_key: "key".into(),
            document_id: "DOC-1".into(),
            request_timeout_secs: 5,
            ..IntakeConfig::default()
        })
        .unwrap();
        SubmissionOrchestrator::new(
            renderer,
            AttachmentAssembler::new(store.clone(), Some(root.to_path_buf())),
            intake,
            MetadataPublisher::new(store),
        )
    }

    fn task(attachments: Vec<AttachmentDescriptor>, max_retries: u32) -> SubmissionTask {
        let body: CommentBody = json!({"general_comment": "", "first_name": "Ada"})
            .as_object()
            .cloned()
            .unwrap();
        SubmissionTask::new(
            body,
            attachments,
            "meta-1".into(),
            RetryConfig {
                max_retries,
                base_delay_ms: 1,
            },
        )
    }

    async fn intake_responds(server: &MockServer, status: u16, times: Option<u64>) {
        let mut template = ResponseTemplate::new(status);
        if status == 201 {
            template = template.set_body_json(json!({"trackingNumber": "T1"}));
        }
        let mock = Mock::given(method("POST")).and(path("/comments")).respond_with(template);
        match times {
            Some(n) => mock.up_to_n_times(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    async fn requests_with_method(server: &MockServer, wanted: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.method.as_str() == wanted)
            .count()
    }

    #[tokio::test]
    async fn retryable_submit_then_single_publish() {
        let server = MockServer::start().await;
        intake_responds(&server, 500, Some(1)).await;
        intake_responds(&server, 201, None).await;
        Mock::given(method("PUT"))
            .and(path("/bucket/meta-1"))
            .and(body_json(json!({"trackingNumber": "T1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let root = tempfile::tempdir().unwrap();

        let mut task = task(Vec::new(), 3);
        let report = orchestrator(&server, "cp", root.path()).run(&mut task).await;

        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(report.submit_attempts, 2);
        assert_eq!(report.publish_attempts, 1);
        assert_eq!(report.tracking_number.as_deref(), Some("T1"));
        assert_eq!(
            report.state_transitions,
            vec![State::Submit, State::Submit, State::Publish, State::End]
        );
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn exhausted_submit_never_publishes() {
        let server = MockServer::start().await;
        intake_responds(&server, 500, None).await;
        let root = tempfile::tempdir().unwrap();

        let mut task = task(Vec::new(), 2);
        let report = orchestrator(&server, "cp", root.path()).run(&mut task).await;

        assert_eq!(report.status, TaskStatus::Failed);
        assert_eq!(report.submit_attempts, 3);
        assert_eq!(report.publish_attempts, 0);
        assert!(matches!(report.failure, Some(FailureKind::Retryable(_))));
        assert_eq!(requests_with_method(&server, "POST").await, 3);
        assert_eq!(requests_with_method(&server, "PUT").await, 0);
    }

    #[tokio::test]
    async fn fatal_conversion_is_not_retried() {
        let server = MockServer::start().await;
        intake_responds(&server, 201, None).await;
        let root = tempfile::tempdir().unwrap();

        let mut task = task(Vec::new(), 3);
        let report = orchestrator(&server, "false", root.path()).run(&mut task).await;

        assert_eq!(report.status, TaskStatus::Failed);
        assert_eq!(report.submit_attempts, 1);
        assert!(matches!(report.failure, Some(FailureKind::Fatal(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn publish_retry_does_not_resubmit() {
        let server = MockServer::start().await;
        intake_responds(&server, 201, None).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let root = tempfile::tempdir().unwrap();

        let mut task = task(Vec::new(), 3);
        let report = orchestrator(&server, "cp", root.path()).run(&mut task).await;

        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(report.submit_attempts, 1);
        assert_eq!(report.publish_attempts, 2);
        assert_eq!(requests_with_method(&server, "POST").await, 1);
    }

    #[tokio::test]
    async fn attachment_download_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket/att-1"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bucket/att-1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"exhibit-bytes".to_vec()))
            .mount(&server)
            .await;
        intake_responds(&server, 201, None).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let root = tempfile::tempdir().unwrap();

        let mut task = task(
            vec![AttachmentDescriptor {
                key: "att-1".into(),
                name: "exhibit.png".into(),
            }],
            3,
        );
        let report = orchestrator(&server, "cp", root.path()).run(&mut task).await;

        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(report.submit_attempts, 2);
        assert_eq!(requests_with_method(&server, "POST").await, 1);

        let requests = server.received_requests().await.unwrap();
        let post = requests
            .iter()
            .find(|request| request.method.as_str() == "POST")
            .unwrap();
        let body = String::from_utf8_lossy(&post.body);
        assert!(body.contains("filename=\"exhibit.png\""));
        assert!(body.contains("exhibit-bytes"));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn pipeline_runs_every_enqueued_task() {
        let server = MockServer::start().await;
        intake_responds(&server, 201, None).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let root = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(orchestrator(&server, "cp", root.path()), 2);

        let handles: Vec<TaskHandle> = (0..3).map(|_| pipeline.enqueue(task(Vec::new(), 1))).collect();
        let ids: Vec<String> = handles.iter().map(|handle| handle.task_id().to_string()).collect();

        for (handle, id) in handles.into_iter().zip(ids) {
            let report = handle.wait().await.unwrap();
            assert_eq!(report.task_id, id);
            assert_eq!(report.status, TaskStatus::Completed);
        }
        assert_eq!(requests_with_method(&server, "POST").await, 3);
        assert_eq!(requests_with_method(&server, "PUT").await, 3);
    }
}
