//! DIAL deployment client.
//!
//! Speaks the OpenAI-compatible streaming chat completions API exposed by a
//! DIAL core at `{endpoint}/openai/deployments/{deployment}/chat/completions`.
//! Attachments arrive under `choices[0].delta.custom_content.attachments`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, header};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::pin::Pin;
use std::time::Duration;

use crate::deployment::{DeltaStream, DeploymentClient, with_retry};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::types::{Attachment, DeploymentDelta, DeploymentRequest};

/// Default DIAL core endpoint.
pub const DEFAULT_DIAL_ENDPOINT: &str = "http://localhost:8080";

/// Default API version query parameter.
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Header carrying the caller credential.
const API_KEY_HEADER: &str = "Api-Key";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`DialClient`].
#[derive(Debug, Clone)]
pub struct DialConfig {
    /// Base URL of the DIAL core.
    pub endpoint: String,

    /// `api-version` query parameter.
    pub api_version: String,

    /// Credential used when a request carries none.
    pub api_key: Option<String>,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors on the initial request.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_DIAL_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl DialConfig {
    /// Create a config for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the fallback credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming client for DIAL deployments.
pub struct DialClient {
    client: Client,
    config: DialConfig,
}

impl DialClient {
    /// Create a new client with the given configuration.
    pub fn new(config: DialConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The client configuration.
    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    /// Build the chat completions URL for a deployment.
    pub fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            deployment,
            self.config.api_version
        )
    }

    /// Build the JSON request body.
    ///
    /// Fixed parameters are flattened first so they can never replace
    /// `messages`, `stream` or `custom_fields`.
    pub fn request_body(request: &DeploymentRequest) -> Value {
        let mut body: Map<String, Value> = request.parameters.clone();
        body.insert("messages".into(), json!(request.messages));
        body.insert("stream".into(), Value::Bool(true));
        if let Some(ref configuration) = request.configuration {
            body.insert(
                "custom_fields".into(),
                json!({ "configuration": configuration }),
            );
        }
        Value::Object(body)
    }

    async fn send(&self, request: &DeploymentRequest, body: &Value) -> Result<Response> {
        let mut builder = self
            .client
            .post(self.completions_url(&request.deployment))
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);

        if let Some(key) = request.api_key.as_ref().or(self.config.api_key.as_ref()) {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }
        Ok(response)
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.unwrap_or_default();
        error_from_status(status.as_u16(), &body, retry_after.as_deref())
    }
}

/// Map an HTTP status and body to an [`LlmError`].
fn error_from_status(status: u16, body: &str, retry_after: Option<&str>) -> LlmError {
    let message = serde_json::from_str::<DialErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

    match status {
        401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
        429 => LlmError::RateLimit(RateLimitInfo::from_header(message, retry_after)),
        400 | 404 | 422 => LlmError::InvalidRequest(message),
        500..=599 => LlmError::Server(message),
        _ => LlmError::Backend(message),
    }
}

#[async_trait]
impl DeploymentClient for DialClient {
    async fn stream(&self, request: DeploymentRequest) -> Result<DeltaStream> {
        let body = Self::request_body(&request);

        tracing::debug!(
            deployment = %request.deployment,
            messages = request.messages.len(),
            has_configuration = request.configuration.is_some(),
            "Sending DIAL streaming request"
        );

        let response = with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "dial",
            || self.send(&request, &body),
        )
        .await?;

        Ok(parse_dial_sse_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        "dial"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DialErrorResponse {
    error: DialErrorDetail,
}

#[derive(Debug, Deserialize)]
struct DialErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DialStreamChunk {
    #[serde(default)]
    choices: Vec<DialStreamChoice>,
    #[serde(default)]
    error: Option<DialErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct DialStreamChoice {
    #[serde(default)]
    delta: Option<DialDelta>,
}

#[derive(Debug, Deserialize)]
struct DialDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    custom_content: Option<DialCustomContent>,
}

#[derive(Debug, Deserialize)]
struct DialCustomContent {
    #[serde(default)]
    attachments: Vec<Attachment>,
}

impl DialStreamChunk {
    fn into_delta(self) -> Result<DeploymentDelta> {
        if let Some(error) = self.error {
            return Err(LlmError::Backend(error.message));
        }

        let Some(delta) = self.choices.into_iter().next().and_then(|c| c.delta) else {
            return Ok(DeploymentDelta::default());
        };

        Ok(DeploymentDelta {
            content: delta.content,
            attachments: delta
                .custom_content
                .map(|c| c.attachments)
                .unwrap_or_default(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Streaming
// ─────────────────────────────────────────────────────────────────────────────

struct DialSseState<E> {
    byte_stream: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, E>> + Send>>,
    buffer: Vec<u8>,
    eof: bool,
    done: bool,
}

/// Turn an SSE byte stream into a stream of deltas.
///
/// Lines are split on raw bytes so multi-byte characters may straddle
/// network chunks. Empty deltas and unparsable events are skipped.
pub(crate) fn parse_dial_sse_stream<E>(
    byte_stream: impl Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
) -> DeltaStream
where
    E: Into<LlmError> + Send + 'static,
{
    Box::pin(futures::stream::unfold(
        DialSseState {
            byte_stream: Box::pin(byte_stream),
            buffer: Vec::new(),
            eof: false,
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                while let Some(line_end) = state.buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = state.buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim();

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim_start();

                    if data == "[DONE]" {
                        state.done = true;
                        return None;
                    }

                    match serde_json::from_str::<DialStreamChunk>(data) {
                        Ok(chunk) => match chunk.into_delta() {
                            Ok(delta) if delta.is_empty() => continue,
                            Ok(delta) => return Some((Ok(delta), state)),
                            Err(e) => {
                                state.done = true;
                                return Some((Err(e), state));
                            }
                        },
                        Err(e) => {
                            tracing::trace!(error = %e, "Skipping unparsable SSE event");
                            continue;
                        }
                    }
                }

                if state.eof {
                    return None;
                }

                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(e.into()), state));
                    }
                    None => {
                        state.eof = true;
                        // Flush a final line that lacks its newline.
                        if !state.buffer.is_empty() {
                            state.buffer.push(b'\n');
                        }
                    }
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn byte_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = std::result::Result<Bytes, LlmError>> + Send + 'static {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<DeploymentDelta>> {
        parse_dial_sse_stream(byte_stream(parts)).collect().await
    }

    #[test]
    fn test_completions_url() {
        let client = DialClient::new(DialConfig::new("http://dial:8080/")).unwrap();
        assert_eq!(
            client.completions_url("gpt-4o"),
            "http://dial:8080/openai/deployments/gpt-4o/chat/completions?api-version=2025-01-01-preview"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let mut configuration = Map::new();
        configuration.insert("size".into(), json!("1024x1792"));
        let mut parameters = Map::new();
        parameters.insert("temperature".into(), json!(0.2));
        parameters.insert("stream".into(), json!(false));
        parameters.insert("messages".into(), json!([]));

        let request = DeploymentRequest::new("dall-e-3")
            .with_message(ChatMessage::system("be brief"))
            .with_message(ChatMessage::user("a cat"))
            .with_configuration(configuration)
            .with_parameters(parameters);

        let body = DialClient::request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "a cat");
        assert_eq!(body["custom_fields"]["configuration"]["size"], "1024x1792");
    }

    #[test]
    fn test_request_body_without_configuration() {
        let request = DeploymentRequest::new("gpt-4o").with_message(ChatMessage::user("hi"));
        let body = DialClient::request_body(&request);
        assert!(body.get("custom_fields").is_none());
    }

    #[test]
    fn test_error_from_status() {
        let body = r#"{"error":{"message":"nope"}}"#;
        assert!(matches!(error_from_status(401, body, None), LlmError::Auth(_)));
        assert!(matches!(error_from_status(403, body, None), LlmError::Auth(_)));
        assert!(matches!(
            error_from_status(404, body, None),
            LlmError::InvalidRequest(m) if m == "nope"
        ));
        let gateway = error_from_status(502, "gateway", None);
        assert!(gateway.is_retryable());
        assert!(matches!(&gateway, LlmError::Server(m) if m.contains("502")));
        assert!(!error_from_status(418, "teapot", None).is_retryable());

        let limited = error_from_status(429, body, Some("7"));
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_parse_text_deltas() {
        let items = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        let text: Vec<String> = items
            .into_iter()
            .map(|d| d.unwrap().content.unwrap())
            .collect();
        assert_eq!(text, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_parse_first_chunk_is_kept() {
        let items = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"first\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().content.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_parse_split_lines_and_utf8() {
        // "é" is 0xC3 0xA9; split it across chunks.
        let first: &'static [u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xC3";
        let second: &'static [u8] = b"\xA9\"}}]}\n\ndata: [DONE]\n";
        let stream = futures::stream::iter(vec![
            Ok::<_, LlmError>(Bytes::from_static(first)),
            Ok(Bytes::from_static(second)),
        ]);
        let items: Vec<_> = parse_dial_sse_stream(stream).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().content.as_deref(), Some("café"));
    }

    #[tokio::test]
    async fn test_parse_attachments() {
        let items = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"custom_content\":{\"attachments\":[{\"type\":\"image/png\",\"title\":\"Image\",\"url\":\"files/x.png\"}]}}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(items.len(), 1);
        let delta = items[0].as_ref().unwrap();
        assert!(delta.content.is_none());
        assert_eq!(delta.attachments.len(), 1);
        assert!(delta.attachments[0].is_inline_image());
        assert_eq!(delta.attachments[0].url.as_deref(), Some("files/x.png"));
    }

    #[tokio::test]
    async fn test_parse_error_event_ends_stream() {
        let items = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"quota\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ])
        .await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Err(LlmError::Backend(m)) if m == "quota"));
    }

    #[tokio::test]
    async fn test_parse_without_done_marker() {
        let items = collect(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().content.as_deref(), Some("tail"));
    }

    #[tokio::test]
    async fn test_parse_skips_comments_and_garbage() {
        let items = collect(vec![
            ": keep-alive\n",
            "event: ping\n",
            "data: not json\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
    }
}
