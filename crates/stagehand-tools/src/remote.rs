//! Tools served by a remote tool server.
//!
//! Remote servers are discovered once at startup. Each tool they advertise
//! becomes a [`RemoteTool`] sharing the server's [`RemoteToolChannel`], and
//! registers in the [`ToolRegistry`](crate::ToolRegistry) like any local
//! tool.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = McpManager::connect_all(configs).await?;
//! for tool in tools_from_manager(&manager).await? {
//!     registry.register(tool);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use stagehand_mcp::{McpClient, McpManager, ToolInfo};

use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::tool::{Tool, ToolResult};

/// Name, description and schema of a remote tool.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<ToolInfo> for RemoteToolSpec {
    fn from(info: ToolInfo) -> Self {
        let description = info
            .description
            .unwrap_or_else(|| format!("Remote tool: {}", info.name));
        let parameters = info.input_schema.unwrap_or_else(|| {
            json!({
                "type": "object",
                "properties": {}
            })
        });

        Self {
            name: info.name,
            description,
            parameters,
        }
    }
}

/// A connection to a server that lists and runs tools.
#[async_trait]
pub trait RemoteToolChannel: Send + Sync {
    /// Name of the server, for logs.
    fn channel_name(&self) -> &str;

    /// Tools the server offers.
    async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>>;

    /// Run a tool and return its text output.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;
}

/// A channel shared by every tool of one server.
pub type SharedChannel = Arc<dyn RemoteToolChannel>;

#[async_trait]
impl RemoteToolChannel for McpClient {
    fn channel_name(&self) -> &str {
        self.name()
    }

    async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>> {
        let tools = McpClient::list_tools(self).await?;
        Ok(tools.into_iter().map(RemoteToolSpec::from).collect())
    }

    /// Results flagged as errors are still returned as text, so the model
    /// sees what the server said.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let result = McpClient::call_tool(self, name, Some(arguments)).await?;
        Ok(result.text())
    }
}

/// Adapter exposing one remote tool through the [`Tool`] trait.
pub struct RemoteTool {
    spec: RemoteToolSpec,
    channel: SharedChannel,
}

impl RemoteTool {
    pub fn new(spec: RemoteToolSpec, channel: SharedChannel) -> Self {
        Self { spec, channel }
    }

    pub fn spec(&self) -> &RemoteToolSpec {
        &self.spec
    }

    pub fn channel_name(&self) -> &str {
        self.channel.channel_name()
    }
}

impl std::fmt::Debug for RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTool")
            .field("name", &self.spec.name)
            .field("channel", &self.channel.channel_name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters(&self) -> Value {
        self.spec.parameters.clone()
    }

    async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult> {
        let arguments = ctx.arguments()?;
        tracing::debug!(
            channel = %self.channel.channel_name(),
            tool = %self.spec.name,
            "calling remote tool"
        );

        let content = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => return Err(ToolError::Cancelled),
            content = self.channel.call_tool(&self.spec.name, arguments) => content,
        };
        let content = content.inspect_err(|e| {
            tracing::warn!(
                channel = %self.channel.channel_name(),
                tool = %self.spec.name,
                error = %e,
                "remote tool call failed"
            );
        })?;

        ctx.transcript.append_content(&content);
        Ok(ToolResult::text(content))
    }
}

/// List a channel's tools and wrap each one.
pub async fn discover_remote_tools(channel: SharedChannel) -> Result<Vec<RemoteTool>> {
    let specs = channel.list_tools().await?;
    tracing::info!(
        channel = %channel.channel_name(),
        tools = specs.len(),
        "discovered remote tools"
    );

    Ok(specs
        .into_iter()
        .map(|spec| RemoteTool::new(spec, Arc::clone(&channel)))
        .collect())
}

/// Wrap every tool discovered by a connected MCP manager.
///
/// # Errors
/// Fails if any server's tool listing fails.
pub async fn tools_from_manager(manager: &McpManager) -> Result<Vec<RemoteTool>> {
    let mut tools = Vec::new();
    for discovered in manager.discover_tools().await? {
        let channel: SharedChannel = discovered.client;
        tools.extend(
            discovered
                .tools
                .into_iter()
                .map(|info| RemoteTool::new(info.into(), Arc::clone(&channel))),
        );
    }
    Ok(tools)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted Channel
// ─────────────────────────────────────────────────────────────────────────────

/// An in-memory channel with fixed tools and canned outputs.
///
/// Records every call as `(tool name, arguments)`.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    name: String,
    specs: Vec<RemoteToolSpec>,
    outputs: HashMap<String, std::result::Result<String, String>>,
    calls: parking_lot::Mutex<Vec<(String, Value)>>,
}

impl ScriptedChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Offer a tool that answers with `output`.
    pub fn with_tool(mut self, spec: RemoteToolSpec, output: impl Into<String>) -> Self {
        self.outputs.insert(spec.name.clone(), Ok(output.into()));
        self.specs.push(spec);
        self
    }

    /// Offer a tool whose calls fail with a remote error.
    pub fn with_failing_tool(mut self, spec: RemoteToolSpec, message: impl Into<String>) -> Self {
        self.outputs.insert(spec.name.clone(), Err(message.into()));
        self.specs.push(spec);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RemoteToolChannel for ScriptedChannel {
    fn channel_name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>> {
        Ok(self.specs.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        self.calls.lock().push((name.to_string(), arguments));
        match self.outputs.get(name) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(message)) => Err(stagehand_mcp::McpError::tool_error(message.clone()).into()),
            None => Err(stagehand_mcp::McpError::server_error(
                stagehand_mcp::JsonRpcError::METHOD_NOT_FOUND,
                format!("unknown tool: {name}"),
                None,
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RecordingSink;

    fn spec(name: &str) -> RemoteToolSpec {
        RemoteToolSpec {
            name: name.to_string(),
            description: format!("{name} tool"),
            parameters: json!({"type": "object", "properties": {"q": {"type": "string"}}}),
        }
    }

    #[test]
    fn test_spec_from_tool_info_defaults() {
        let spec = RemoteToolSpec::from(ToolInfo {
            name: "bare".into(),
            description: None,
            input_schema: None,
        });
        assert_eq!(spec.description, "Remote tool: bare");
        assert_eq!(spec.parameters["type"], "object");
    }

    #[tokio::test]
    async fn test_discovery_shares_channel() {
        let channel: SharedChannel = Arc::new(
            ScriptedChannel::new("docs")
                .with_tool(spec("search"), "found")
                .with_tool(spec("fetch"), "fetched"),
        );

        let tools = discover_remote_tools(Arc::clone(&channel)).await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name(), "search");
        assert_eq!(tools[1].name(), "fetch");
        assert!(tools.iter().all(|t| t.channel_name() == "docs"));
        // The test handle plus one per tool.
        assert_eq!(Arc::strong_count(&channel), 3);
    }

    #[tokio::test]
    async fn test_execute_appends_output() {
        let channel = Arc::new(ScriptedChannel::new("docs").with_tool(spec("search"), "3 hits"));
        let tool = RemoteTool::new(spec("search"), channel.clone());
        let sink = Arc::new(RecordingSink::new());
        let ctx = ToolContext::new("conv", r#"{"q": "rust"}"#).with_transcript(sink.clone());

        let result = tool.execute(&ctx).await.unwrap();
        assert_eq!(result, ToolResult::text("3 hits"));
        assert_eq!(sink.content(), "3 hits");
        assert_eq!(channel.calls(), vec![("search".to_string(), json!({"q": "rust"}))]);
    }

    #[tokio::test]
    async fn test_malformed_arguments_never_reach_server() {
        let channel = Arc::new(ScriptedChannel::new("docs").with_tool(spec("search"), "x"));
        let tool = RemoteTool::new(spec("search"), channel.clone());

        let err = tool
            .execute(&ToolContext::new("conv", "{broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(channel.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_fatal() {
        let channel = Arc::new(
            ScriptedChannel::new("docs").with_failing_tool(spec("search"), "index offline"),
        );
        let tool = RemoteTool::new(spec("search"), channel);
        let sink = Arc::new(RecordingSink::new());
        let ctx = ToolContext::new("conv", "{}").with_transcript(sink.clone());

        let err = tool.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::Remote(_)));
        assert!(err.to_string().contains("index offline"));
        assert!(sink.is_empty());
    }
}
