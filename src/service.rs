//! Front-end operations: upload tickets, previews, submissions and lookups.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::attachments::AttachmentAssembler;
use crate::comment::{check_attachment_count, extract_files, parse_body, validate_attachment};
use crate::config::{AttachmentLimits, RelayConfig};
use crate::error::{RelayError, ValidationError};
use crate::intake::{DOCUMENT_FILENAME, IntakeClient};
use crate::lookup::LookupClient;
use crate::orchestrator::{Pipeline, SubmissionOrchestrator, TaskHandle};
use crate::publish::MetadataPublisher;
use crate::render::Renderer;
use crate::storage::presign::attachment_disposition;
use crate::storage::{ObjectStore, PresignedUrlIssuer, S3Store};
use crate::task::{RetryConfig, SubmissionTask};

pub const DEFAULT_UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrls {
    pub get: String,
    pub put: String,
}

/// Where the browser should PUT an attachment, and where it can read it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub key: String,
    pub urls: UploadUrls,
}

/// Immediate answer to a submission; the pipeline keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTicket {
    pub status: String,
    pub metadata_url: String,
}

pub struct CommentService {
    store: Arc<dyn ObjectStore>,
    issuer: PresignedUrlIssuer,
    renderer: Renderer,
    pipeline: Pipeline,
    lookups: LookupClient,
    limits: AttachmentLimits,
    retry: RetryConfig,
    preview_prefix: String,
    preview_expiry: Duration,
}

impl CommentService {
    /// Wire every component against the configured S3 endpoint.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let store = S3Store::new(&config.storage, config.intake.request_timeout())?;
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: &RelayConfig, store: Arc<dyn ObjectStore>) -> Result<Self, RelayError> {
        let staging_root = config.workers.staging_root.clone();
        let renderer = Renderer::new(&config.renderer, staging_root.clone());
        let orchestrator = SubmissionOrchestrator::new(
            renderer.clone(),
            AttachmentAssembler::new(Arc::clone(&store), staging_root),
            IntakeClient::new(&config.intake)?,
            MetadataPublisher::new(Arc::clone(&store)),
        );

        Ok(Self {
            issuer: PresignedUrlIssuer::new(
                Arc::clone(&store),
                Duration::from_secs(config.storage.url_expiration_secs),
            ),
            store,
            renderer,
            pipeline: Pipeline::new(orchestrator, config.workers.concurrency),
            lookups: LookupClient::new(&config.intake, &config.lookup_cache)?,
            limits: config.attachments.clone(),
            retry: config.retry.clone(),
            preview_prefix: config.storage.preview_prefix.clone(),
            preview_expiry: Duration::from_secs(config.storage.preview_expiration_secs),
        })
    }

    /// Validate a prospective attachment and issue its PUT/GET URL pair.
    pub fn request_upload(
        &self,
        name: &str,
        size: i64,
        content_type: Option<&str>,
    ) -> Result<UploadTicket, RelayError> {
        if let Err(err) = validate_attachment(name, size, &self.limits) {
            error!(name, size, reason = %err, "attachment rejected");
            return Err(err.into());
        }
        let key = random_key();
        // Validation guarantees a positive size.
        let size = size as u64;
        let put = self.issuer.issue_upload_url(
            &key,
            content_type.unwrap_or(DEFAULT_UPLOAD_CONTENT_TYPE),
            size,
            name,
        )?;
        let get = self
            .issuer
            .issue_download_url(&key, Some(name), Some(self.preview_expiry))?;

        Ok(UploadTicket {
            key,
            urls: UploadUrls {
                get: get.into(),
                put: put.into(),
            },
        })
    }

    /// Render the comment, store the PDF under the preview prefix and return
    /// a link to it.
    pub async fn preview(&self, body: Value) -> Result<String, RelayError> {
        let Value::Object(body) = body else {
            return Err(ValidationError::MalformedBody.into());
        };
        let key = format!("{}/{}", self.preview_prefix.trim_end_matches('/'), random_key());

        let bytes = {
            let mut document = self.renderer.render(&body).await?;
            document.read_bytes().await?
        };
        self.store
            .put_object(
                &key,
                bytes,
                "application/pdf",
                Some(&attachment_disposition(DOCUMENT_FILENAME)),
            )
            .await?;

        let url = self
            .issuer
            .issue_download_url(&key, None, Some(self.preview_expiry))?;
        info!(key = %key, "comment preview stored");
        Ok(url.into())
    }

    /// Validate and enqueue a submission. Returns as soon as the task is
    /// queued; the handle resolves when the pipeline finishes.
    pub fn submit(&self, body: Value) -> Result<(SubmitTicket, TaskHandle), RelayError> {
        let body = parse_body(body).inspect_err(|err| error!(reason = %err, "submission rejected"))?;
        let files = extract_files(&body).inspect_err(|err| error!(reason = %err, "submission rejected"))?;
        check_attachment_count(files.len(), &self.limits)
            .inspect_err(|err| error!(count = files.len(), reason = %err, "submission rejected"))?;

        let metadata_key = random_key();
        let metadata_url = self.issuer.issue_download_url(&metadata_key, None, None)?;

        let task = SubmissionTask::new(body, files, metadata_key, self.retry.clone());
        let handle = self.pipeline.enqueue(task);
        info!(task_id = handle.task_id(), "submission queued");

        Ok((
            SubmitTicket {
                status: "submitted".to_string(),
                metadata_url: metadata_url.into(),
            },
            handle,
        ))
    }

    pub async fn federal_agencies(&self) -> Result<Vec<Value>, RelayError> {
        Ok(self.lookups.federal_agencies().await?)
    }

    pub async fn agency_types(&self) -> Result<Vec<Value>, RelayError> {
        Ok(self.lookups.agency_types().await?)
    }
}

fn random_key() -> String {
    Uuid::new_v4().simple().to_string()
}
