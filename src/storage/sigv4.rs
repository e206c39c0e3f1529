//! AWS Signature Version 4 for S3-compatible endpoints.
//!
//! Two flavours are needed: header signing for the requests this process
//! makes itself (`Authorization` header), and query signing for presigned
//! URLs handed to browsers.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const SERVICE: &str = "s3";

/// Presigned URLs cannot outlive seven days.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Everything that scopes one signature.
#[derive(Debug, Clone)]
pub struct SigningContext<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub time: DateTime<Utc>,
}

impl SigningContext<'_> {
    pub fn amz_date(&self) -> String {
        self.time.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn date_stamp(&self) -> String {
        self.time.format("%Y%m%d").to_string()
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/{SERVICE}/aws4_request",
            self.date_stamp(),
            self.region
        )
    }

    fn credential(&self) -> String {
        format!("{}/{}", self.credentials.access_key_id, self.scope())
    }

    fn signature(&self, canonical_request: &str) -> String {
        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{}\n{}",
            self.amz_date(),
            self.scope(),
            sha256_hex(canonical_request.as_bytes())
        );
        let key = signing_key(
            &self.credentials.secret_access_key,
            &self.date_stamp(),
            self.region,
            SERVICE,
        );
        hex::encode(hmac(&key, string_to_sign.as_bytes()))
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the per-day, per-region signing key.
pub fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// RFC 3986 encoding as SigV4 wants it: only unreserved characters pass.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b'/' if !encode_slash => encoded.push('/'),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Encode, then sort by name and value.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(name, value)| (uri_encode(name, true), uri_encode(value, true)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns `(canonical_headers, signed_headers)`.
pub fn canonical_headers(headers: &[(String, String)]) -> (String, String) {
    let mut normalized: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            (name.to_ascii_lowercase(), value)
        })
        .collect();
    normalized.sort();

    let canonical = normalized
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect::<String>();
    let signed = normalized
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    (canonical, signed)
}

fn canonical_request(
    method: &str,
    canonical_uri: &str,
    query: &str,
    headers: &[(String, String)],
    payload_hash: &str,
) -> (String, String) {
    let (canonical_headers, signed_headers) = canonical_headers(headers);
    let request = format!(
        "{method}\n{canonical_uri}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );
    (request, signed_headers)
}

/// Value for the `Authorization` header of a request this process sends.
///
/// `headers` must already contain `host`, `x-amz-date` and
/// `x-amz-content-sha256`.
pub fn authorization_header(
    method: &str,
    canonical_uri: &str,
    query: &[(String, String)],
    headers: &[(String, String)],
    payload_hash: &str,
    ctx: &SigningContext<'_>,
) -> String {
    let (request, signed_headers) = canonical_request(
        method,
        canonical_uri,
        &canonical_query(query),
        headers,
        payload_hash,
    );
    format!(
        "{ALGORITHM} Credential={}, SignedHeaders={signed_headers}, Signature={}",
        ctx.credential(),
        ctx.signature(&request)
    )
}

/// Full query string (signature included) of a presigned URL.
///
/// `headers` must contain `host`; any other entry becomes a header the
/// holder of the URL has to send verbatim.
pub fn presign_query(
    method: &str,
    canonical_uri: &str,
    query: &[(String, String)],
    headers: &[(String, String)],
    expires_secs: u64,
    ctx: &SigningContext<'_>,
) -> String {
    let (_, signed_headers) = canonical_headers(headers);
    let mut params = query.to_vec();
    params.extend([
        ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
        ("X-Amz-Credential".to_string(), ctx.credential()),
        ("X-Amz-Date".to_string(), ctx.amz_date()),
        (
            "X-Amz-Expires".to_string(),
            expires_secs.min(MAX_PRESIGN_EXPIRY_SECS).to_string(),
        ),
        ("X-Amz-SignedHeaders".to_string(), signed_headers),
    ]);
    let query = canonical_query(&params);
    let (request, _) = canonical_request(method, canonical_uri, &query, headers, UNSIGNED_PAYLOAD);
    format!("{query}&X-Amz-Signature={}", ctx.signature(&request))
}
