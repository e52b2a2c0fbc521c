//! MCP (Model Context Protocol) client for Stagehand.
//!
//! Remote tools are discovered and invoked over the streamable HTTP
//! transport:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpManager                                                 │
//! │  - connects every configured server at startup              │
//! │  - discovers tools once per server                          │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient                                                  │
//! │  - initialize, tools/list, tools/call                       │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HttpTransport                                              │
//! │  - JSON-RPC 2.0 POSTs, JSON or SSE replies                  │
//! │  - carries the Mcp-Session-Id header                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The protocol flow is:
//! 1. Client sends `initialize` with its info
//! 2. Server responds with its info (and usually a session id)
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`

pub mod client;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod transport;

pub use client::{McpClient, McpServerConfig};
pub use error::{McpError, Result};
pub use manager::{DiscoveredTools, McpManager};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerInfo, ToolContent,
    ToolInfo,
};
pub use transport::{DEFAULT_MCP_URL, HttpTransport, HttpTransportConfig, SESSION_HEADER};
