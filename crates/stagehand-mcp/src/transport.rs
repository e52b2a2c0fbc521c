//! Streamable HTTP transport for MCP.
//!
//! Every JSON-RPC message is a POST to a single endpoint. The server answers
//! either with a plain `application/json` body or with a `text/event-stream`
//! whose `data:` events carry JSON-RPC messages; the reply matching the
//! request id is picked out. A session id handed out by the server in the
//! `Mcp-Session-Id` header is echoed on every later request.

use std::time::Duration;

use reqwest::{Client, Response, header};

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Default MCP server URL.
pub const DEFAULT_MCP_URL: &str = "http://localhost:8051/mcp";

/// Session header defined by the streamable HTTP transport.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint URL of the MCP server.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Number of retries for requests that fail to send.
    pub retries: u32,
    /// Extra headers (authentication and the like).
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MCP_URL.to_string(),
            timeout: Duration::from_secs(30),
            retries: 3,
            headers: Vec::new(),
        }
    }
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// HTTP transport to one MCP endpoint.
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    session_id: parking_lot::Mutex<Option<String>>,
}

impl HttpTransport {
    /// Build the transport. No request is sent until the first message.
    pub fn connect(config: HttpTransportConfig) -> Result<Self> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| McpError::transport(format!("invalid URL: {}", e)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(
            url = %config.url,
            timeout_secs = config.timeout.as_secs(),
            "created MCP HTTP transport"
        );

        Ok(Self {
            client,
            config,
            session_id: parking_lot::Mutex::new(None),
        })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// The session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    /// Send a request and wait for its response.
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let body = serde_json::to_string(request)?;
        tracing::trace!(url = %self.config.url, json = %body, "sending MCP request");

        let response = self.post(body).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let text = response
            .text()
            .await
            .map_err(|e| McpError::transport(format!("failed to read response body: {}", e)))?;
        tracing::trace!(json = %text, "received MCP response");

        if content_type.starts_with("text/event-stream") {
            find_sse_response(&text, request.id)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }

    /// Send a notification. The server acknowledges without a body.
    pub async fn send_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let body = serde_json::to_string(notification)?;
        self.post(body).await?;
        Ok(())
    }

    /// POST one message, retrying send failures, and check the status.
    async fn post(&self, body: String) -> Result<Response> {
        let mut retries = self.config.retries;
        let response = loop {
            let mut req = self
                .client
                .post(&self.config.url)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, ACCEPT_BOTH)
                .body(body.clone());
            for (key, value) in &self.config.headers {
                req = req.header(key, value);
            }
            if let Some(session) = self.session_id() {
                req = req.header(SESSION_HEADER, session);
            }

            match req.send().await {
                Ok(resp) => break resp,
                Err(e) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        error = %e,
                        retries_remaining = retries,
                        "MCP HTTP request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => {
                    return Err(McpError::transport(format!("HTTP request failed: {}", e)));
                }
            }
        };

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut current = self.session_id.lock();
            if current.as_deref() != Some(session) {
                tracing::debug!(session = %session, "MCP session established");
                *current = Some(session.to_string());
            }
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::transport(format!("HTTP error {}: {}", status, body)));
        }

        Ok(response)
    }
}

/// Pick the response with `id` out of an SSE body.
///
/// Events are separated by blank lines; multi-line `data:` fields are
/// joined with newlines. Events that are not the awaited reply are skipped.
pub(crate) fn find_sse_response(body: &str, id: u64) -> Result<JsonRpcResponse> {
    let mut data = String::new();

    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&data) {
                    if response.id == Some(id) {
                        return Ok(response);
                    }
                }
                data.clear();
            }
            continue;
        }

        if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    Err(McpError::protocol(format!(
        "event stream ended without a response to request {}",
        id
    )))
}
