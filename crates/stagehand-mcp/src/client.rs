//! MCP client for one streamable HTTP server.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, ServerInfo, ToolInfo,
};
use crate::transport::{HttpTransport, HttpTransportConfig};

/// Configuration for an MCP server connection.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    /// Unique name for this server.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// HTTP headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Number of send retries.
    pub retries: Option<u32>,
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
            retries: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    fn transport_config(&self) -> HttpTransportConfig {
        let mut config = HttpTransportConfig::new(&self.url);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(retries) = self.retries {
            config = config.with_retries(retries);
        }
        for (key, value) in &self.headers {
            config = config.with_header(key, value);
        }
        config
    }
}

/// An MCP client connected to a single server.
///
/// Once initialized the client is shared read-only (`Arc<McpClient>`);
/// concurrent calls are independent HTTP requests.
pub struct McpClient {
    config: McpServerConfig,
    transport: HttpTransport,
    server_info: OnceLock<ServerInfo>,
    request_id: AtomicU64,
}

impl McpClient {
    /// Create a client. This does NOT initialize the session; call
    /// [`initialize`](Self::initialize) next.
    pub fn connect(config: McpServerConfig) -> Result<Self> {
        let transport = HttpTransport::connect(config.transport_config())?;

        tracing::info!(server = %config.name, url = %config.url, "created MCP client");

        Ok(Self {
            config,
            transport,
            server_info: OnceLock::new(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Connect and run the initialize handshake.
    pub async fn connect_and_initialize(config: McpServerConfig) -> Result<Self> {
        let client = Self::connect(config)?;
        client.initialize().await?;
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// Server info, after initialization.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.server_info.get().is_some()
    }

    /// The transport session id, if the server assigned one.
    pub fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let response = self.transport.send_request(&request).await?;
        response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))
    }

    /// Perform the MCP handshake: `initialize` followed by the
    /// `notifications/initialized` notification.
    ///
    /// Calling it again after success returns the stored server info.
    pub async fn initialize(&self) -> Result<&ServerInfo> {
        if let Some(info) = self.server_info.get() {
            return Ok(info);
        }

        let params = serde_json::to_value(InitializeParams::default())?;
        let result = self.send_request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(result)?;

        tracing::info!(
            server = %self.config.name,
            remote = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "MCP server initialized"
        );

        self.transport
            .send_notification(&JsonRpcNotification::new("notifications/initialized", None))
            .await?;

        Ok(self.server_info.get_or_init(|| init.server_info))
    }

    /// List the server's tools, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.take().map(|c| serde_json::json!({ "cursor": c }));
            let result = self.send_request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            server = %self.config.name,
            tool_count = tools.len(),
            "listed MCP tools"
        );

        Ok(tools)
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` is returned as-is; callers decide how to
    /// surface it.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.send_request("tools/call", Some(params)).await?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(server = %self.config.name, tool = %name, "tool call returned error");
        } else {
            tracing::debug!(server = %self.config.name, tool = %name, "tool call succeeded");
        }

        Ok(call_result)
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.config.name)
            .field("url", &self.config.url)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_builder() {
        let config = McpServerConfig::new("docs", "https://mcp.example.com/mcp")
            .with_header("Authorization", "Bearer token123")
            .with_timeout(Duration::from_secs(60))
            .with_retries(5);

        assert_eq!(config.name, "docs");
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));

        let transport = config.transport_config();
        assert_eq!(transport.url, "https://mcp.example.com/mcp");
        assert_eq!(transport.retries, 5);
        assert_eq!(
            transport.headers,
            vec![("Authorization".to_string(), "Bearer token123".to_string())]
        );
    }

    #[test]
    fn test_connect_does_not_initialize() {
        let client = McpClient::connect(McpServerConfig::new("local", "http://localhost:8051/mcp"))
            .unwrap();
        assert!(!client.is_initialized());
        assert!(client.server_info().is_none());
        assert_eq!(client.name(), "local");
    }

    #[tokio::test]
    async fn test_calls_require_initialize() {
        let client =
            McpClient::connect(McpServerConfig::new("local", "http://localhost:1/mcp")).unwrap();
        assert!(matches!(
            client.list_tools().await,
            Err(McpError::NotInitialized)
        ));
        assert!(matches!(
            client.call_tool("x", None).await,
            Err(McpError::NotInitialized)
        ));
    }

    #[test]
    fn test_request_ids_increment() {
        let client = McpClient::connect(McpServerConfig::new("local", "http://localhost:8051/mcp"))
            .unwrap();
        assert_eq!(client.next_request_id(), 1);
        assert_eq!(client.next_request_id(), 2);
    }
}
