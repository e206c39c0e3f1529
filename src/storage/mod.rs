//! Remote object storage: the narrow interface the pipeline consumes plus an
//! S3-compatible implementation.

pub mod error;
pub mod presign;
pub mod s3;
pub mod sigv4;

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

pub use error::StorageError;
pub use presign::PresignedUrlIssuer;
pub use s3::S3Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignMethod {
    Get,
    Put,
}

impl PresignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresignMethod::Get => "GET",
            PresignMethod::Put => "PUT",
        }
    }
}

/// Parameters for a time-limited URL to one object.
#[derive(Debug, Clone)]
pub struct PresignRequest {
    pub method: PresignMethod,
    pub key: String,
    pub expires_in: Duration,
    /// Headers the URL holder must send verbatim (lowercase names).
    pub headers: Vec<(String, String)>,
    /// Extra signed query parameters, e.g. `response-content-disposition`.
    pub query: Vec<(String, String)>,
}

impl PresignRequest {
    pub fn new(method: PresignMethod, key: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            method,
            key: key.into(),
            expires_in,
            headers: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }
}

/// Object storage scoped to one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object's bytes.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Upload bytes under `key`.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        content_disposition: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Build a presigned URL. Pure computation, no network access.
    fn presigned_url(&self, request: &PresignRequest) -> Result<Url, StorageError>;
}
