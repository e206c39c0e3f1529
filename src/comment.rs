//! Comment bodies, attachment descriptors and the synchronous checks run
//! before anything is queued.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AttachmentLimits;
use crate::error::ValidationError;

/// Field name → value mapping exactly as the client submitted it.
pub type CommentBody = serde_json::Map<String, Value>;

/// Marker field every body must carry; overridden on submission.
pub const GENERAL_COMMENT_FIELD: &str = "general_comment";

/// A file the client already placed in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    /// Storage object key.
    pub key: String,
    /// Display file name used in the outbound payload.
    pub name: String,
}

/// Parse a raw JSON document into a [`CommentBody`].
pub fn parse_body(value: Value) -> Result<CommentBody, ValidationError> {
    let Value::Object(body) = value else {
        return Err(ValidationError::MalformedBody);
    };
    if !body.contains_key(GENERAL_COMMENT_FIELD) {
        return Err(ValidationError::MissingGeneralComment);
    }
    Ok(body)
}

/// Collect the attachments referenced by `sections[*].files[*]`.
///
/// Extra descriptor keys (`size`, `previewUrl`) are ignored.
pub fn extract_files(body: &CommentBody) -> Result<Vec<AttachmentDescriptor>, ValidationError> {
    let Some(sections) = body.get("sections") else {
        return Ok(Vec::new());
    };
    let sections = sections.as_array().ok_or(ValidationError::MalformedBody)?;

    let mut files = Vec::new();
    for section in sections {
        let Some(section_files) = section.get("files") else {
            continue;
        };
        let section_files = section_files
            .as_array()
            .ok_or(ValidationError::MalformedBody)?;
        for file in section_files {
            let descriptor: AttachmentDescriptor = serde_json::from_value(file.clone())
                .map_err(|_| ValidationError::IncompleteAttachment)?;
            if descriptor.key.is_empty() || descriptor.name.is_empty() {
                return Err(ValidationError::IncompleteAttachment);
            }
            files.push(descriptor);
        }
    }
    Ok(files)
}

/// Check a prospective upload against the size and extension limits.
pub fn validate_attachment(
    filename: &str,
    size: i64,
    limits: &AttachmentLimits,
) -> Result<(), ValidationError> {
    if size <= 0 || size as u64 > limits.max_size {
        return Err(ValidationError::InvalidSize);
    }
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !limits
        .valid_extensions
        .iter()
        .any(|valid| valid.eq_ignore_ascii_case(&extension))
    {
        return Err(ValidationError::InvalidType);
    }
    Ok(())
}

/// One slot is reserved for the rendered comment itself.
pub fn check_attachment_count(
    count: usize,
    limits: &AttachmentLimits,
) -> Result<(), ValidationError> {
    if count > limits.max_count.saturating_sub(1) {
        return Err(ValidationError::TooManyAttachments);
    }
    Ok(())
}
