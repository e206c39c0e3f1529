use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{info, warn};

use super::types::{AttachmentPayload, FormField, SubmissionOutcome, build_fields, classify_response};
use crate::attachments::StagedAttachment;
use crate::comment::CommentBody;
use crate::config::IntakeConfig;
use crate::render::RenderedDocument;

/// Posts finished comments to the intake API.
pub struct IntakeClient {
    client: Client,
    url: String,
    api_key: String,
    document_id: String,
}

impl IntakeClient {
    pub fn new(config: &IntakeConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            document_id: config.document_id.clone(),
        })
    }

    /// Read the staged document and attachments and post them.
    ///
    /// Local read failures are reported as retryable; the next attempt
    /// stages everything again from scratch.
    pub async fn submit(
        &self,
        body: &CommentBody,
        document: &mut RenderedDocument,
        attachments: &mut [StagedAttachment],
    ) -> SubmissionOutcome {
        let document_bytes = match document.read_bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                return SubmissionOutcome::retryable(format!("failed to read rendered document: {err}"));
            }
        };

        let mut payloads = Vec::with_capacity(attachments.len());
        for attachment in attachments.iter_mut() {
            match attachment.read_bytes().await {
                Ok(bytes) => payloads.push(AttachmentPayload {
                    filename: attachment.name().to_string(),
                    bytes,
                }),
                Err(err) => {
                    return SubmissionOutcome::retryable(format!(
                        "failed to read attachment `{}`: {err}",
                        attachment.name()
                    ));
                }
            }
        }

        let fields = build_fields(&self.document_id, body, document_bytes, payloads);
        self.post(fields).await
    }

    /// Send an already assembled field list.
    pub async fn post(&self, fields: Vec<FormField>) -> SubmissionOutcome {
        let started_at = Instant::now();
        let form = match into_form(fields) {
            Ok(form) => form,
            Err(err) => return SubmissionOutcome::retryable(format!("failed to build form: {err}")),
        };

        let response = match self
            .client
            .post(&self.url)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let kind = if err.is_timeout() { "timeout" } else { "network" };
                warn!(
                    error = %err,
                    kind,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "post to intake API failed"
                );
                return SubmissionOutcome::retryable(format!("{kind} error: {err}"));
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                return SubmissionOutcome::retryable(format!("failed to read intake response: {err}"));
            }
        };

        let outcome = classify_response(status, &text);
        match &outcome {
            SubmissionOutcome::Success(receipt) => info!(
                status,
                tracking_number = %receipt.tracking_number,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                response = %text,
                "comment accepted by intake API"
            ),
            _ => warn!(
                status,
                response = %text,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "post to intake API failed"
            ),
        }
        outcome
    }
}

fn into_form(fields: Vec<FormField>) -> Result<Form, reqwest::Error> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name, value),
            FormField::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                let mut part = Part::bytes(bytes).file_name(filename);
                if let Some(content_type) = content_type {
                    part = part.mime_str(&content_type)?;
                }
                form.part(name, part)
            }
        };
    }
    Ok(form)
}
