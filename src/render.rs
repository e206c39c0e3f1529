//! Comment body → HTML → PDF.
//!
//! Markup generation is a pure function over the body. PDF conversion shells
//! out to an external converter (wkhtmltopdf by default) inside a staging
//! directory that lives exactly as long as the returned [`RenderedDocument`].

use std::io::{self, ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;
use tracing::{info, warn};

use crate::comment::{CommentBody, GENERAL_COMMENT_FIELD};
use crate::config::RendererConfig;
use crate::staging::staging_dir;

const HTML_NAME: &str = "document.html";
const PDF_NAME: &str = "document.pdf";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to stage document: {0}")]
    Io(#[from] io::Error),

    #[error("document converter unavailable: {0}")]
    NotFound(io::Error),

    #[error("document converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("document converter failed (exit {exit_code:?}): {stderr}")]
    Conversion {
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl RenderError {
    /// Whether retrying with the same input is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::Conversion { .. } | RenderError::NotFound(_))
    }
}

/// A converted PDF, open for reading. Dropping it closes the handle and
/// removes the staging directory.
#[derive(Debug)]
pub struct RenderedDocument {
    file: File,
    staging: TempDir,
}

impl RenderedDocument {
    /// Read the whole document from the start.
    pub async fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }

    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    converter_path: PathBuf,
    converter_args: Vec<String>,
    timeout: Duration,
    staging_root: Option<PathBuf>,
}

impl Renderer {
    pub fn new(config: &RendererConfig, staging_root: Option<PathBuf>) -> Self {
        Self {
            converter_path: config.converter_path.clone(),
            converter_args: config.converter_args.clone(),
            timeout: config.timeout(),
            staging_root,
        }
    }

    pub async fn render(&self, body: &CommentBody) -> Result<RenderedDocument, RenderError> {
        let markup = to_markup(body);
        self.to_document(&markup).await
    }

    /// Run the converter over `markup` and open the resulting PDF.
    pub async fn to_document(&self, markup: &str) -> Result<RenderedDocument, RenderError> {
        let started_at = Instant::now();
        let staging = staging_dir(self.staging_root.as_deref(), "render-")?;
        let html_path = staging.path().join(HTML_NAME);
        let pdf_path = staging.path().join(PDF_NAME);
        tokio::fs::write(&html_path, markup).await?;

        let child = Command::new(&self.converter_path)
            .args(&self.converter_args)
            .arg(&html_path)
            .arg(&pdf_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(
                    converter = %self.converter_path.display(),
                    error = %err,
                    "failed to spawn document converter"
                );
                return Err(if err.kind() == ErrorKind::NotFound {
                    RenderError::NotFound(err)
                } else {
                    RenderError::Io(err)
                });
            }
            Err(_) => {
                warn!(
                    converter = %self.converter_path.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "document converter timed out"
                );
                return Err(RenderError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                converter = %self.converter_path.display(),
                exit_code = ?output.status.code(),
                stderr = %stderr,
                "document conversion failed"
            );
            return Err(RenderError::Conversion {
                exit_code: output.status.code(),
                stderr,
            });
        }

        let file = File::open(&pdf_path).await?;
        info!(
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            markup_bytes = markup.len(),
            "comment rendered to PDF"
        );
        Ok(RenderedDocument { file, staging })
    }
}

/// Render the body to a standalone HTML document.
pub fn to_markup(body: &CommentBody) -> String {
    let markdown = to_markdown(body);
    let html = comrak::markdown_to_html(&markdown, &comrak::Options::default());
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Comment</title></head>\n<body>\n{html}</body>\n</html>\n"
    )
}

fn to_markdown(body: &CommentBody) -> String {
    let mut out = String::new();
    out.push_str("# Comment\n\n");

    let general = body
        .get(GENERAL_COMMENT_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if !general.is_empty() {
        out.push_str("## General comment\n\n");
        out.push_str(general);
        out.push_str("\n\n");
    }

    if let Some(Value::Array(sections)) = body.get("sections") {
        for section in sections {
            write_section(&mut out, section);
        }
    }

    let details: Vec<(&String, String)> = body
        .iter()
        .filter(|(name, _)| name.as_str() != GENERAL_COMMENT_FIELD && name.as_str() != "sections")
        .filter_map(|(name, value)| scalar_text(value).map(|text| (name, text)))
        .collect();
    if !details.is_empty() {
        out.push_str("## Submitter details\n\n");
        for (name, text) in details {
            out.push_str(&format!("- **{name}**: {text}\n"));
        }
        out.push('\n');
    }

    out
}

fn write_section(out: &mut String, section: &Value) {
    let title = ["label", "id"]
        .iter()
        .find_map(|field| section.get(*field).and_then(Value::as_str))
        .unwrap_or("Section");
    out.push_str(&format!("## {title}\n\n"));

    if let Some(comment) = section.get("comment").and_then(Value::as_str) {
        out.push_str(comment.trim());
        out.push_str("\n\n");
    }

    if let Some(Value::Array(files)) = section.get("files") {
        let names: Vec<&str> = files
            .iter()
            .filter_map(|file| file.get("name").and_then(Value::as_str))
            .collect();
        if !names.is_empty() {
            out.push_str("Attachments:\n\n");
            for name in names {
                out.push_str(&format!("- {name}\n"));
            }
            out.push('\n');
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> CommentBody {
        value.as_object().cloned().unwrap()
    }

    fn renderer(program: &str, args: &[&str], root: &Path) -> Renderer {
        Renderer {
            converter_path: PathBuf::from(program),
            converter_args: args.iter().map(|arg| arg.to_string()).collect(),
            timeout: Duration::from_secs(10),
            staging_root: Some(root.to_path_buf()),
        }
    }

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).unwrap().count()
    }

    #[test]
    fn markup_includes_sections_and_details() {
        let html = to_markup(&body(json!({
            "general_comment": "",
            "first_name": "Ada",
            "zip": 20552,
            "sections": [{
                "id": "1024-1",
                "label": "§ 1024.1",
                "comment": "This is **important**.",
                "files": [{"key": "k", "name": "evidence.pdf"}],
            }],
        })));
        assert!(html.contains("<h2>§ 1024.1</h2>"));
        assert!(html.contains("<strong>important</strong>"));
        assert!(html.contains("evidence.pdf"));
        assert!(html.contains("Ada"));
        assert!(html.contains("20552"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn submitter_details_keep_submitted_order() {
        let body: CommentBody =
            serde_json::from_str(r#"{"zip":"20552","general_comment":"","first_name":"Ada"}"#).unwrap();
        let html = to_markup(&body);
        assert!(html.find("20552").unwrap() < html.find("Ada").unwrap());
    }

    #[test]
    fn markup_omits_raw_html() {
        let html = to_markup(&body(json!({
            "general_comment": "",
            "sections": [{"id": "1", "comment": "<script>alert(1)</script>"}],
        })));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn to_document_runs_converter_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let renderer = renderer("cp", &[], root.path());

        let mut document = renderer.to_document("<p>hello</p>").await.unwrap();
        let staging = document.staging_path().to_path_buf();
        assert!(staging.exists());
        assert_eq!(document.read_bytes().await.unwrap(), b"<p>hello</p>");
        // Readable more than once.
        assert_eq!(document.read_bytes().await.unwrap(), b"<p>hello</p>");

        drop(document);
        assert!(!staging.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_fatal_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let renderer = renderer("false", &[], root.path());

        let err = renderer.to_document("<p>x</p>").await.unwrap_err();
        assert!(matches!(err, RenderError::Conversion { exit_code: Some(1), .. }));
        assert!(err.is_fatal());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn missing_converter_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let renderer = renderer("/nonexistent/wkhtmltopdf", &[], root.path());

        let err = renderer.to_document("<p>x</p>").await.unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
        assert!(err.is_fatal());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn timeout_is_retryable_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let mut renderer = renderer("sh", &["-c", "sleep 5", "sh"], root.path());
        renderer.timeout = Duration::from_millis(100);

        let err = renderer.to_document("<p>x</p>").await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
        assert!(!err.is_fatal());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn render_produces_document_from_body() {
        let root = tempfile::tempdir().unwrap();
        let renderer = renderer("cp", &[], root.path());
        let mut document = renderer
            .render(&body(json!({"general_comment": "Please reconsider."})))
            .await
            .unwrap();
        let bytes = document.read_bytes().await.unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("Please reconsider."));
    }
}
