use thiserror::Error;

use crate::lookup::LookupError;
use crate::render::RenderError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejections detected before anything is queued. The display text is
/// returned to the submitting user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid attachment size")]
    InvalidSize,

    #[error("Invalid attachment type")]
    InvalidType,

    #[error("Too many attachments")]
    TooManyAttachments,

    #[error("Comment body must be a JSON object")]
    MalformedBody,

    #[error("Comment body is missing the `general_comment` field")]
    MissingGeneralComment,

    #[error("Attachment descriptor is missing a key or name")]
    IncompleteAttachment,
}

/// Classifies a stage failure for retry decisions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Infrastructure failure (storage, network, timeout, non-201 intake response).
    Retryable(String),
    /// The same input will fail identically on retry (document conversion).
    Fatal(String),
}

impl FailureKind {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureKind::Fatal(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            FailureKind::Retryable(reason) | FailureKind::Fatal(reason) => reason,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Retryable(msg) => write!(f, "Retryable failure: {msg}"),
            FailureKind::Fatal(msg) => write!(f, "Fatal failure: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(ValidationError::InvalidSize.to_string(), "Invalid attachment size");
        assert_eq!(ValidationError::InvalidType.to_string(), "Invalid attachment type");
        assert_eq!(ValidationError::TooManyAttachments.to_string(), "Too many attachments");
    }

    #[test]
    fn relay_error_is_transparent_for_validation() {
        let err: RelayError = ValidationError::TooManyAttachments.into();
        assert_eq!(err.to_string(), "Too many attachments");
    }

    #[test]
    fn failure_kind_display() {
        let retry = FailureKind::Retryable("intake returned 500".into());
        assert_eq!(retry.to_string(), "Retryable failure: intake returned 500");
        assert!(!retry.is_fatal());

        let fatal = FailureKind::Fatal("converter exited with 1".into());
        assert_eq!(fatal.to_string(), "Fatal failure: converter exited with 1");
        assert!(fatal.is_fatal());
        assert_eq!(fatal.reason(), "converter exited with 1");
    }
}
