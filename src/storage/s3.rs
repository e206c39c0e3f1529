use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, Response};
use tracing::debug;
use url::Url;

use super::sigv4::{self, Credentials, SigningContext};
use super::{ObjectStore, PresignRequest, StorageError};
use crate::config::StorageConfig;

/// Path-style S3 client: `{endpoint}/{bucket}/{key}`.
pub struct S3Store {
    client: Client,
    endpoint: Url,
    bucket: String,
    region: String,
    credentials: Credentials,
}

impl S3Store {
    pub fn new(config: &StorageConfig, timeout: Duration) -> Result<Self, StorageError> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            credentials: Credentials {
                access_key_id: config.access_key_id.clone(),
                secret_access_key: config.secret_access_key.clone(),
            },
        })
    }

    // Must match the Host header reqwest derives from the URL.
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn object_path(&self, key: &str) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        format!(
            "{base}/{}/{}",
            sigv4::uri_encode(&self.bucket, true),
            sigv4::uri_encode(key, false)
        )
    }

    fn url_for(&self, path: &str, query: Option<&str>) -> Result<Url, StorageError> {
        let origin = self.endpoint.origin().ascii_serialization();
        let raw = match query {
            Some(query) => format!("{origin}{path}?{query}"),
            None => format!("{origin}{path}"),
        };
        Ok(Url::parse(&raw)?)
    }

    fn signing_context(&self) -> SigningContext<'_> {
        SigningContext {
            credentials: &self.credentials,
            region: &self.region,
            time: Utc::now(),
        }
    }

    async fn send_signed(
        &self,
        method: Method,
        key: &str,
        body: Vec<u8>,
        extra_headers: Vec<(String, String)>,
    ) -> Result<Response, StorageError> {
        let path = self.object_path(key);
        let payload_hash = sigv4::sha256_hex(&body);
        let ctx = self.signing_context();

        let mut headers = vec![
            ("host".to_string(), self.host()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), ctx.amz_date()),
        ];
        headers.extend(extra_headers);

        let authorization =
            sigv4::authorization_header(method.as_str(), &path, &[], &headers, &payload_hash, &ctx);
        let sends_body = method == Method::PUT;

        let mut request = self
            .client
            .request(method, self.url_for(&path, None)?)
            .header("authorization", authorization);
        for (name, value) in headers.iter().filter(|(name, _)| name != "host") {
            request = request.header(name.as_str(), value.as_str());
        }
        if sends_body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StorageError::Status {
                status: status.as_u16(),
                key: key.to_string(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.send_signed(Method::GET, key, Vec::new(), Vec::new()).await?;
        let bytes = response.bytes().await?;
        debug!(bucket = %self.bucket, key, size = bytes.len(), "object downloaded");
        Ok(bytes.to_vec())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        content_disposition: Option<&str>,
    ) -> Result<(), StorageError> {
        let size = body.len();
        let mut headers = vec![("content-type".to_string(), content_type.to_string())];
        if let Some(disposition) = content_disposition {
            headers.push(("content-disposition".to_string(), disposition.to_string()));
        }
        self.send_signed(Method::PUT, key, body, headers).await?;
        debug!(bucket = %self.bucket, key, size, "object uploaded");
        Ok(())
    }

    fn presigned_url(&self, request: &PresignRequest) -> Result<Url, StorageError> {
        let path = self.object_path(&request.key);
        let mut headers = vec![("host".to_string(), self.host())];
        headers.extend(request.headers.iter().cloned());

        let query = sigv4::presign_query(
            request.method.as_str(),
            &path,
            &request.query,
            &headers,
            request.expires_in.as_secs().max(1),
            &self.signing_context(),
        );
        self.url_for(&path, Some(&query))
    }
}
