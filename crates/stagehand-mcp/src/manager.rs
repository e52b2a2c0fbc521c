//! Startup-time management of several MCP servers.

use std::sync::Arc;

use crate::client::{McpClient, McpServerConfig};
use crate::error::{McpError, Result};
use crate::protocol::ToolInfo;

/// Tools discovered on one server.
#[derive(Debug, Clone)]
pub struct DiscoveredTools {
    pub client: Arc<McpClient>,
    pub tools: Vec<ToolInfo>,
}

/// The set of initialized MCP clients.
///
/// Every configured server must come up: a server that cannot be reached
/// or listed fails startup with [`McpError::Unavailable`].
#[derive(Debug, Default)]
pub struct McpManager {
    clients: Vec<Arc<McpClient>>,
}

impl McpManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect and initialize every configured server.
    ///
    /// # Errors
    /// The first server that fails to connect or initialize.
    pub async fn connect_all(configs: Vec<McpServerConfig>) -> Result<Self> {
        let mut manager = Self::new();

        for config in configs {
            let name = config.name.clone();
            let client = McpClient::connect_and_initialize(config)
                .await
                .map_err(|e| {
                    tracing::error!(server = %name, error = %e, "failed to connect to MCP server");
                    McpError::unavailable(&name, e)
                })?;
            tracing::info!(server = %name, "MCP server connected");
            manager.clients.push(Arc::new(client));
        }

        tracing::info!(connected = manager.clients.len(), "MCP server connection complete");
        Ok(manager)
    }

    /// Add an already-initialized client.
    pub fn add_client(&mut self, client: Arc<McpClient>) {
        self.clients.push(client);
    }

    pub fn clients(&self) -> &[Arc<McpClient>] {
        &self.clients
    }

    pub fn get_client(&self, name: &str) -> Option<Arc<McpClient>> {
        self.clients.iter().find(|c| c.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Discover tools on every connected server, once.
    ///
    /// # Errors
    /// The first server whose listing fails.
    pub async fn discover_tools(&self) -> Result<Vec<DiscoveredTools>> {
        let mut discovered = Vec::with_capacity(self.clients.len());
        for client in &self.clients {
            let tools = client.list_tools().await.map_err(|e| {
                tracing::error!(server = %client.name(), error = %e, "failed to list MCP tools");
                McpError::unavailable(client.name(), e)
            })?;
            tracing::info!(server = %client.name(), tool_count = tools.len(), "discovered MCP tools");
            discovered.push(DiscoveredTools {
                client: Arc::clone(client),
                tools,
            });
        }
        Ok(discovered)
    }
}
