use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::{ObjectStore, PresignMethod, PresignRequest, StorageError};

/// Issues time-limited URLs so browsers can move attachment bytes in and out
/// of storage without routing them through this process.
#[derive(Clone)]
pub struct PresignedUrlIssuer {
    store: Arc<dyn ObjectStore>,
    default_expiry: Duration,
}

impl PresignedUrlIssuer {
    pub fn new(store: Arc<dyn ObjectStore>, default_expiry: Duration) -> Self {
        Self {
            store,
            default_expiry,
        }
    }

    /// URL for a single PUT of exactly `size` bytes of `content_type`.
    ///
    /// The uploader must send `Content-Type`, `Content-Length` and
    /// `x-amz-meta-name` with the same values.
    pub fn issue_upload_url(
        &self,
        key: &str,
        content_type: &str,
        size: u64,
        filename: &str,
    ) -> Result<Url, StorageError> {
        let request = PresignRequest::new(PresignMethod::Put, key, self.default_expiry)
            .header("content-length", size.to_string())
            .header("content-type", content_type)
            .header("x-amz-meta-name", filename);
        self.store.presigned_url(&request)
    }

    /// URL for reading `key`, optionally forcing a download file name.
    pub fn issue_download_url(
        &self,
        key: &str,
        disposition_filename: Option<&str>,
        expiry: Option<Duration>,
    ) -> Result<Url, StorageError> {
        let mut request = PresignRequest::new(
            PresignMethod::Get,
            key,
            expiry.unwrap_or(self.default_expiry),
        );
        if let Some(filename) = disposition_filename {
            request = request.query("response-content-disposition", attachment_disposition(filename));
        }
        self.store.presigned_url(&request)
    }
}

pub fn attachment_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename.replace('"', ""))
}
