//! Payload and outcome types for the intake API.
//!
//! The outbound request is a multipart form whose field order is fixed:
//! `comment_on`, the rendered document, the `general_comment` override, the
//! remaining body fields, then one `uploadedFile` per attachment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::comment::{CommentBody, GENERAL_COMMENT_FIELD};

pub const DOCUMENT_FIELD: &str = "uploadedFile";
pub const DOCUMENT_FILENAME: &str = "comment.pdf";
pub const GENERAL_COMMENT_OVERRIDE: &str = "See attached comment.pdf";

/// One multipart field, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormField {
    pub fn name(&self) -> &str {
        match self {
            FormField::Text { name, .. } | FormField::File { name, .. } => name,
        }
    }

    fn text(name: &str, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// An attachment's display name and contents, ready for the form.
#[derive(Debug, Clone)]
pub struct AttachmentPayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Assemble the ordered field list for one submission.
pub fn build_fields(
    document_id: &str,
    body: &CommentBody,
    document: Vec<u8>,
    attachments: Vec<AttachmentPayload>,
) -> Vec<FormField> {
    let mut fields = Vec::with_capacity(body.len() + attachments.len() + 3);
    fields.push(FormField::text("comment_on", document_id));
    fields.push(FormField::File {
        name: DOCUMENT_FIELD.to_string(),
        filename: DOCUMENT_FILENAME.to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: document,
    });
    fields.push(FormField::text(GENERAL_COMMENT_FIELD, GENERAL_COMMENT_OVERRIDE));

    fields.extend(
        body.iter()
            .filter(|(name, _)| name.as_str() != GENERAL_COMMENT_FIELD)
            .map(|(name, value)| FormField::text(name, field_text(value))),
    );

    fields.extend(attachments.into_iter().map(|attachment| FormField::File {
        name: DOCUMENT_FIELD.to_string(),
        filename: attachment.filename,
        content_type: None,
        bytes: attachment.bytes,
    }));
    fields
}

// Strings go out verbatim; anything structured as compact JSON.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// What Stage A hands to Stage B.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub tracking_number: String,
    pub raw_response: Value,
}

/// Classified result of one submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Success(SubmissionReceipt),
    Retryable { reason: String },
    Fatal { reason: String },
}

impl SubmissionOutcome {
    pub fn retryable(reason: impl Into<String>) -> Self {
        SubmissionOutcome::Retryable {
            reason: reason.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        SubmissionOutcome::Fatal {
            reason: reason.into(),
        }
    }
}

/// Only a 201 carrying a string `trackingNumber` counts as success.
pub fn classify_response(status: u16, body: &str) -> SubmissionOutcome {
    if status != 201 {
        return SubmissionOutcome::retryable(format!("intake returned status {status}: {body}"));
    }
    let raw_response: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            return SubmissionOutcome::retryable(format!("intake response is not JSON: {err}"));
        }
    };
    match raw_response.get("trackingNumber").and_then(Value::as_str) {
        Some(tracking_number) => SubmissionOutcome::Success(SubmissionReceipt {
            tracking_number: tracking_number.to_string(),
            raw_response,
        }),
        None => SubmissionOutcome::retryable("intake response has no trackingNumber"),
    }
}
