use thiserror::Error;

/// Errors that can occur while talking to object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage answered with a non-success status.
    #[error("storage returned status {status} for `{key}`: {message}")]
    Status {
        status: u16,
        key: String,
        message: String,
    },

    /// Connection, DNS or timeout failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid storage URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
