//! Document text extraction.
//!
//! Tools never parse file formats themselves. They ask a [`DocumentExtractor`]
//! for the text of a URL and get `None` when there is none to be had.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::error::{Result, ToolError};
use crate::formats::{DocumentFormat, delimited_to_markdown, html_to_text, pdf_to_text};

/// Header carrying the caller credential on downloads.
const API_KEY_HEADER: &str = "Api-Key";

/// Default download timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of plain text for a document URL.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Fetch the text of a document, forwarding the caller credential.
    ///
    /// Returns `Ok(None)` when the document has no extractable text.
    ///
    /// # Errors
    /// Transport failures and non-success responses.
    async fn extract_text(&self, file_url: &str, credential: Option<&str>)
    -> Result<Option<String>>;
}

/// An extractor shared between tools.
pub type SharedExtractor = Arc<dyn DocumentExtractor>;

/// Treat whitespace-only text as no text.
pub fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Extractor
// ─────────────────────────────────────────────────────────────────────────────

/// Downloads documents from the file storage and decodes them to text.
///
/// Text formats are read as is. HTML is reduced to its visible text, CSV and
/// TSV become markdown tables, and PDFs yield their text layer.
///
/// Relative URLs (`files/abc/report.txt`) resolve against
/// `{endpoint}/v1/`; absolute `http(s)` URLs are fetched as given.
#[derive(Debug, Clone)]
pub struct HttpDocumentExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDocumentExtractor {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// The URL a document is downloaded from.
    pub fn resolve_url(&self, file_url: &str) -> String {
        if file_url.starts_with("http://") || file_url.starts_with("https://") {
            return file_url.to_string();
        }
        format!(
            "{}/v1/{}",
            self.endpoint.trim_end_matches('/'),
            file_url.trim_start_matches('/')
        )
    }
}

/// Decode a downloaded body into text.
async fn decode(format: DocumentFormat, bytes: Bytes) -> Result<Option<String>> {
    let text = match format {
        DocumentFormat::Text => Some(String::from_utf8_lossy(&bytes).into_owned()),
        DocumentFormat::Html => Some(html_to_text(&String::from_utf8_lossy(&bytes))),
        DocumentFormat::Csv | DocumentFormat::Tsv => {
            let delimiter = if format == DocumentFormat::Csv { b',' } else { b'\t' };
            let table = delimited_to_markdown(&bytes, delimiter)
                .map_err(|e| ToolError::extraction(format!("malformed {format:?} file: {e}")))?;
            Some(table)
        }
        DocumentFormat::Pdf => tokio::task::spawn_blocking(move || pdf_to_text(&bytes))
            .await
            .map_err(|e| ToolError::internal(format!("PDF extraction task failed: {e}")))?,
    };
    Ok(text)
}

#[async_trait]
impl DocumentExtractor for HttpDocumentExtractor {
    async fn extract_text(
        &self,
        file_url: &str,
        credential: Option<&str>,
    ) -> Result<Option<String>> {
        let url = self.resolve_url(file_url);
        tracing::debug!(url = %url, "downloading document");

        let mut request = self.client.get(&url);
        if let Some(key) = credential {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::extraction(format!("failed to download {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::extraction(format!(
                "HTTP {status} downloading {url}: {body}"
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let Some(format) = DocumentFormat::detect(content_type.as_deref(), file_url) else {
            tracing::debug!(
                url = %url,
                content_type = content_type.as_deref().unwrap_or("none"),
                "document has no text format, nothing extracted"
            );
            return Ok(None);
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::extraction(format!("failed to read {url}: {e}")))?;

        tracing::debug!(url = %url, ?format, bytes = bytes.len(), "decoding document");
        Ok(non_empty(decode(format, bytes).await?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Extractor
// ─────────────────────────────────────────────────────────────────────────────

/// An in-memory extractor that counts calls.
#[derive(Debug, Default)]
pub struct MockExtractor {
    documents: HashMap<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    credentials: parking_lot::Mutex<Vec<Option<String>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `file_url`. Unknown URLs extract to `None`.
    pub fn with_document(mut self, file_url: impl Into<String>, text: impl Into<String>) -> Self {
        self.documents.insert(file_url.into(), text.into());
        self
    }

    /// Sleep before answering, to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The credential passed on each call, in order.
    pub fn credentials(&self) -> Vec<Option<String>> {
        self.credentials.lock().clone()
    }
}

#[async_trait]
impl DocumentExtractor for MockExtractor {
    async fn extract_text(
        &self,
        file_url: &str,
        credential: Option<&str>,
    ) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().push(credential.map(str::to_string));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self.documents.get(file_url).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let extractor = HttpDocumentExtractor::new("http://localhost:8080/").unwrap();
        assert_eq!(
            extractor.resolve_url("files/abc/report.txt"),
            "http://localhost:8080/v1/files/abc/report.txt"
        );
        assert_eq!(
            extractor.resolve_url("/files/abc/report.txt"),
            "http://localhost:8080/v1/files/abc/report.txt"
        );
        assert_eq!(
            extractor.resolve_url("https://example.com/a.txt"),
            "https://example.com/a.txt"
        );
    }

    #[tokio::test]
    async fn test_decode_formats() {
        let html = Bytes::from_static(b"<p>Hello <i>there</i></p><script>x()</script>");
        let text = decode(DocumentFormat::Html, html).await.unwrap();
        assert_eq!(text.as_deref(), Some("Hello\nthere"));

        let csv = Bytes::from_static(b"a,b\n1,2\n");
        let table = decode(DocumentFormat::Csv, csv).await.unwrap();
        assert_eq!(table.as_deref(), Some("| a | b |\n| --- | --- |\n| 1 | 2 |\n"));

        let tsv = Bytes::from_static(b"a\tb\n");
        let table = decode(DocumentFormat::Tsv, tsv).await.unwrap();
        assert_eq!(table.as_deref(), Some("| a | b |\n| --- | --- |\n"));

        let pdf = Bytes::from_static(b"%PDF-1.7");
        assert_eq!(decode(DocumentFormat::Pdf, pdf).await.unwrap(), None);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("x".into())), Some("x".into()));
        assert_eq!(non_empty(Some(" \n\t".into())), None);
        assert_eq!(non_empty(None), None);
    }

    #[tokio::test]
    async fn test_mock_extractor() {
        let extractor = MockExtractor::new().with_document("files/a.txt", "hello");

        let text = extractor
            .extract_text("files/a.txt", Some("key"))
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("hello"));
        assert_eq!(extractor.extract_text("files/b.txt", None).await.unwrap(), None);

        assert_eq!(extractor.call_count(), 2);
        assert_eq!(extractor.credentials(), vec![Some("key".to_string()), None]);
    }
}
