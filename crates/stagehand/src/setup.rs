//! Builds the tool registry from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use stagehand_cache::{CacheConfig, DocumentCache};
use stagehand_config::{EmbeddingConfig, McpConfig, StagehandConfig};
use stagehand_llm::{DialClient, DialConfig, EmbedderSpec, SharedDeploymentClient};
use stagehand_mcp::{DEFAULT_MCP_URL, McpManager, McpServerConfig};
use stagehand_tools::{
    Chunker, DeploymentProxy, DeploymentTool, FileContentExtractionTool, HttpDocumentExtractor,
    ImageGenerationTool, IndexCache, RagTool, SharedExtractor, ToolRegistry, tools_from_manager,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A ready registry plus the background work it depends on.
pub struct Runtime {
    pub registry: ToolRegistry,
    cancel: CancellationToken,
    cleanup: JoinHandle<()>,
}

impl Runtime {
    /// Stop background tasks.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.cleanup.await {
            tracing::warn!(error = %e, "cache cleanup task ended abnormally");
        }
    }
}

/// Build every configured tool.
///
/// Fails if an enabled remote server cannot be reached or listed.
pub async fn build_runtime(config: &StagehandConfig, verbose: bool) -> Result<Runtime> {
    let dial = config.dial.clone().unwrap_or_default();
    let rag = config.rag.clone().unwrap_or_default();
    let image = config.image.clone().unwrap_or_default();
    let files = config.files.clone().unwrap_or_default();
    let cache_cfg = config.cache.clone().unwrap_or_default();

    // ── Downstream client ───────────────────────────────────────────────────

    let mut dial_config = DialConfig::new(&dial.endpoint)
        .with_api_version(&dial.api_version)
        .with_timeout(Duration::from_secs(dial.timeout_secs))
        .with_max_retries(dial.max_retries);
    if let Some(api_key) = &dial.api_key {
        dial_config = dial_config.with_api_key(api_key);
    }
    let client: SharedDeploymentClient =
        Arc::new(DialClient::new(dial_config).context("failed to create DIAL client")?);

    // ── Embedder ────────────────────────────────────────────────────────────

    let embedding_config = config.embedding.clone().unwrap_or_default();
    let embedder = stagehand_llm::build_embedder(&build_embedder_spec(&embedding_config))?;
    if verbose {
        eprintln!("Embedder: {} ({}d)", embedder.name(), embedder.dimensions());
    }

    // ── Index cache ─────────────────────────────────────────────────────────

    let mut cache_config = CacheConfig::new()
        .with_max_documents(cache_cfg.max_documents)
        .with_cleanup_interval(Duration::from_secs(cache_cfg.cleanup_interval_secs));
    if let Some(ttl) = cache_cfg.ttl_secs {
        cache_config = cache_config.with_ttl(Duration::from_secs(ttl));
    }
    let cache: IndexCache = DocumentCache::new(cache_config);
    let cancel = CancellationToken::new();
    let cleanup = cache.spawn_cleanup_task(cancel.child_token());

    // ── Built-in tools ──────────────────────────────────────────────────────

    let extractor: SharedExtractor = Arc::new(HttpDocumentExtractor::with_timeout(
        &dial.endpoint,
        Duration::from_secs(dial.timeout_secs),
    )?);

    let mut registry = ToolRegistry::new();
    registry.register(
        RagTool::new(client.clone(), embedder, extractor.clone(), cache)
            .with_deployment(&rag.deployment)
            .with_top_k(rag.top_k)
            .with_chunker(Chunker::new(rag.chunk_size, rag.chunk_overlap)?),
    );
    registry.register(FileContentExtractionTool::with_page_size(
        extractor,
        files.page_size,
    ));
    if image.enabled {
        registry.register(ImageGenerationTool::with_deployment(
            client.clone(),
            &image.deployment,
        ));
    }

    for entry in &config.deployments {
        let mut proxy = DeploymentProxy::new(client.clone(), &entry.deployment)
            .with_parameters(entry.parameters.clone());
        if let Some(system_prompt) = &entry.system_prompt {
            proxy = proxy.with_system_prompt(system_prompt);
        }
        match DeploymentTool::new(&entry.name, &entry.description, proxy) {
            Ok(tool) => registry.register(tool),
            Err(e) => tracing::warn!(tool = %entry.name, error = %e, "skipping deployment tool"),
        }
    }

    // ── Remote tools ────────────────────────────────────────────────────────

    let mcp = config.mcp.clone().unwrap_or_default();
    let servers = mcp_server_configs(&mcp);
    if !servers.is_empty() {
        if verbose {
            eprintln!("MCP: connecting to {} server(s)...", servers.len());
        }
        let manager = McpManager::connect_all(servers)
            .await
            .context("failed to connect to MCP servers")?;
        let tools = tools_from_manager(&manager)
            .await
            .context("failed to discover MCP tools")?;
        for tool in tools {
            if verbose {
                eprintln!("  Registered: {}", tool.spec().name);
            }
            registry.register(tool);
        }
    } else if verbose && !mcp.enabled {
        eprintln!("MCP: disabled");
    }

    tracing::debug!(tools = registry.len(), "tool registry ready");
    Ok(Runtime {
        registry,
        cancel,
        cleanup,
    })
}

/// Build an `EmbedderSpec` from the application's `EmbeddingConfig`.
fn build_embedder_spec(config: &EmbeddingConfig) -> EmbedderSpec {
    let (openai_api_key, openai_model, openai_base_url) = config
        .openai
        .as_ref()
        .map(|c| {
            let api_key = c
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            (api_key, Some(c.model.clone()), c.base_url.clone())
        })
        .unwrap_or((None, None, None));

    let (local_model_path, local_tokenizer_path) = config
        .local
        .as_ref()
        .map(|c| (c.model_path.clone(), c.tokenizer_path.clone()))
        .unwrap_or((None, None));

    EmbedderSpec {
        provider: config.provider.as_str().to_string(),
        dimensions: config.effective_dimensions(),
        local_model_path,
        local_tokenizer_path,
        openai_api_key,
        openai_model,
        openai_base_url,
    }
}

/// Client configs for the enabled MCP servers.
fn mcp_server_configs(mcp: &McpConfig) -> Vec<McpServerConfig> {
    mcp.enabled_servers()
        .map(|entry| {
            let url = entry.url.as_deref().unwrap_or(DEFAULT_MCP_URL);
            let mut config = McpServerConfig::new(&entry.name, url);
            for [key, value] in &entry.headers {
                config = config.with_header(key, value);
            }
            if let Some(timeout) = entry.timeout_secs {
                config = config.with_timeout(Duration::from_secs(timeout));
            }
            if let Some(retries) = entry.retries {
                config = config.with_retries(retries);
            }
            config
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_config::{EmbeddingProvider, McpServerEntry};

    #[test]
    fn test_embedder_spec_from_config() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Mock,
            dimensions: Some(64),
            ..Default::default()
        };
        let spec = build_embedder_spec(&config);
        assert_eq!(spec.provider, "mock");
        assert_eq!(spec.dimensions, 64);
        assert!(spec.openai_model.is_none());
    }

    #[test]
    fn test_mcp_server_configs() {
        let mut unnamed_url = McpServerEntry::new("local", "unused");
        unnamed_url.url = None;
        let mut disabled = McpServerEntry::new("off", "http://off/mcp");
        disabled.enabled = false;
        let mut docs = McpServerEntry::new("docs", "http://docs/mcp");
        docs.headers = vec![["Authorization".into(), "Bearer t".into()]];
        docs.retries = Some(1);

        let mcp = McpConfig {
            enabled: true,
            servers: vec![unnamed_url, disabled, docs],
        };
        let configs = mcp_server_configs(&mcp);
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].url, DEFAULT_MCP_URL);
        assert_eq!(configs[1].name, "docs");
        assert_eq!(
            configs[1].headers,
            vec![("Authorization".to_string(), "Bearer t".to_string())]
        );
        assert_eq!(configs[1].retries, Some(1));
    }

    #[tokio::test]
    async fn test_build_runtime_registers_builtin_tools() {
        let config = StagehandConfig::from_toml(
            r#"
[embedding]
provider = "mock"

[image]
enabled = false

[[deployments]]
name = "summarize"
description = "Summarizes text"
deployment = "gpt-4o-mini"
"#,
        )
        .unwrap();

        let runtime = build_runtime(&config, false).await.unwrap();
        assert_eq!(
            runtime.registry.names(),
            vec!["file_content_extractor", "rag_tool", "summarize"]
        );
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_build_runtime_fails_on_unreachable_mcp_server() {
        let config = StagehandConfig::from_toml(
            r#"
[embedding]
provider = "mock"

[[mcp.servers]]
name = "tickets"
url = "http://127.0.0.1:1/mcp"
retries = 0
"#,
        )
        .unwrap();

        let err = build_runtime(&config, false).await.err().unwrap();
        let message = format!("{err:#}");
        assert!(message.contains("failed to connect to MCP servers"));
        assert!(message.contains("'tickets'"));
    }

    #[tokio::test]
    async fn test_build_runtime_ignores_disabled_mcp_server() {
        let config = StagehandConfig::from_toml(
            r#"
[embedding]
provider = "mock"

[[mcp.servers]]
name = "tickets"
url = "http://127.0.0.1:1/mcp"
enabled = false
"#,
        )
        .unwrap();

        let runtime = build_runtime(&config, false).await.unwrap();
        assert!(!runtime.registry.contains("tickets"));
        runtime.shutdown().await;
    }
}
