//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [dial]                   # DIAL core connection
//! [rag]                    # retrieval tool
//! [image]                  # image generation tool
//! [files]                  # file content extraction tool
//! [cache]                  # per-conversation index cache
//! [embedding]              # embedding provider
//! [mcp]                    # remote tool servers
//! [[deployments]]          # extra deployment-backed tools
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StagehandConfig {
    /// DIAL core connection.
    pub dial: Option<DialSection>,

    /// Retrieval tool settings.
    pub rag: Option<RagSection>,

    /// Image generation tool settings.
    pub image: Option<ImageSection>,

    /// File content extraction settings.
    pub files: Option<FilesSection>,

    /// Index cache settings.
    pub cache: Option<CacheSection>,

    /// Embedding provider configuration.
    pub embedding: Option<EmbeddingConfig>,

    /// MCP server configuration.
    pub mcp: Option<McpConfig>,

    /// Deployment-backed tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<DeploymentEntry>,
}

impl StagehandConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate every section present.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Other(e.to_string()))
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole. Deployments are matched by name: an entry
    /// in `other` replaces the entry of the same name, new names are appended.
    pub fn merge(&mut self, other: StagehandConfig) {
        if other.dial.is_some() {
            self.dial = other.dial;
        }

        if other.rag.is_some() {
            self.rag = other.rag;
        }

        if other.image.is_some() {
            self.image = other.image;
        }

        if other.files.is_some() {
            self.files = other.files;
        }

        if other.cache.is_some() {
            self.cache = other.cache;
        }

        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }

        if other.mcp.is_some() {
            self.mcp = other.mcp;
        }

        for entry in other.deployments {
            match self.deployments.iter_mut().find(|d| d.name == entry.name) {
                Some(existing) => *existing = entry,
                None => self.deployments.push(entry),
            }
        }
    }

    /// Check the values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if let Some(rag) = &self.rag {
            if rag.chunk_size == 0 {
                return Err(ConfigError::Other("[rag] chunk_size must be positive".into()));
            }
            if rag.chunk_overlap >= rag.chunk_size {
                return Err(ConfigError::Other(format!(
                    "[rag] chunk_overlap ({}) must be smaller than chunk_size ({})",
                    rag.chunk_overlap, rag.chunk_size
                )));
            }
            if rag.top_k == 0 {
                return Err(ConfigError::Other("[rag] top_k must be positive".into()));
            }
        }

        if let Some(files) = &self.files
            && files.page_size == 0
        {
            return Err(ConfigError::Other("[files] page_size must be positive".into()));
        }

        if let Some(cache) = &self.cache
            && cache.max_documents == 0
        {
            return Err(ConfigError::Other(
                "[cache] max_documents must be positive".into(),
            ));
        }

        for entry in &self.deployments {
            if entry.name.is_empty() {
                return Err(ConfigError::Other("[[deployments]] entry without a name".into()));
            }
        }

        Ok(())
    }

    /// Plaintext credentials found in the config, as `[section]` labels.
    pub fn plaintext_key_sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if self.dial.as_ref().is_some_and(|d| d.api_key.is_some()) {
            sections.push("[dial]");
        }
        if self
            .embedding
            .as_ref()
            .and_then(|e| e.openai.as_ref())
            .is_some_and(|o| o.api_key.is_some())
        {
            sections.push("[embedding.openai]");
        }
        sections
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DIAL
// ─────────────────────────────────────────────────────────────────────────────

/// DIAL core connection.
///
/// ```toml
/// [dial]
/// endpoint = "http://localhost:8080"
/// api_version = "2025-01-01-preview"
/// timeout_secs = 300
/// max_retries = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialSection {
    /// Base URL of the DIAL core.
    pub endpoint: String,
    /// `api-version` query parameter.
    pub api_version: String,
    /// Credential used when a call carries none (prefer `DIAL_API_KEY`).
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient errors on the initial request.
    pub max_retries: u32,
}

impl Default for DialSection {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            api_version: "2025-01-01-preview".to_string(),
            api_key: None,
            timeout_secs: 300,
            max_retries: 3,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// Retrieval tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSection {
    /// Deployment answering the augmented prompt.
    pub deployment: String,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
}

impl Default for RagSection {
    fn default() -> Self {
        Self {
            deployment: "gpt-4o".to_string(),
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
        }
    }
}

/// Image generation tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSection {
    pub deployment: String,
    pub enabled: bool,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            deployment: "dall-e-3".to_string(),
            enabled: true,
        }
    }
}

/// File content extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    /// Characters per page.
    pub page_size: usize,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self { page_size: 10_000 }
    }
}

/// Index cache settings.
///
/// ```toml
/// [cache]
/// max_documents = 100
/// ttl_secs = 3600
/// cleanup_interval_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Indexes kept before the least recently used is evicted.
    pub max_documents: usize,
    /// Idle time after which an index expires. Unset keeps indexes until evicted.
    pub ttl_secs: Option<u64>,
    /// Seconds between expiry sweeps.
    pub cleanup_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_documents: 100,
            ttl_secs: None,
            cleanup_interval_secs: 60,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding provider configuration.
///
/// ```toml
/// [embedding]
/// provider = "local"
/// dimensions = 384
///
/// [embedding.openai]
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider: "local" (ONNX), "openai", or "mock".
    pub provider: EmbeddingProvider,
    /// Output embedding dimensions. Default depends on provider.
    pub dimensions: Option<usize>,
    /// OpenAI-specific embedding settings.
    pub openai: Option<EmbeddingOpenAiConfig>,
    /// Local ONNX-specific settings.
    pub local: Option<EmbeddingLocalConfig>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            dimensions: None,
            openai: None,
            local: None,
        }
    }
}

impl EmbeddingConfig {
    /// Effective dimensions for the configured provider.
    pub fn effective_dimensions(&self) -> usize {
        if let Some(d) = self.dimensions {
            return d;
        }
        match self.provider {
            EmbeddingProvider::Local | EmbeddingProvider::Mock => 384,
            EmbeddingProvider::OpenAi => 1536,
        }
    }
}

/// Supported embedding providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX Runtime inference (default, offline-first).
    Local,
    /// OpenAI-compatible embeddings API.
    OpenAi,
    /// Mock embedder for testing.
    Mock,
}

impl EmbeddingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

/// OpenAI embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingOpenAiConfig {
    /// Model name. Default: "text-embedding-3-small".
    pub model: String,
    /// Custom base URL (for proxies).
    pub base_url: Option<String>,
    /// API key (prefer an environment variable).
    pub api_key: Option<String>,
}

impl Default for EmbeddingOpenAiConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Local ONNX embedding settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingLocalConfig {
    /// Path to ONNX model file.
    pub model_path: Option<PathBuf>,
    /// Path to tokenizer.json file.
    pub tokenizer_path: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP
// ─────────────────────────────────────────────────────────────────────────────

/// MCP server configuration.
///
/// ```toml
/// [mcp]
/// enabled = true
///
/// [[mcp.servers]]
/// name = "docs"
/// url = "http://localhost:8051/mcp"
/// headers = [["Authorization", "Bearer token"]]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Whether MCP is enabled globally.
    pub enabled: bool,
    /// Configured MCP servers.
    #[serde(default)]
    pub servers: Vec<McpServerEntry>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            servers: Vec::new(),
        }
    }
}

impl McpConfig {
    /// Servers that should be connected.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &McpServerEntry> {
        self.servers.iter().filter(move |s| self.enabled && s.enabled)
    }
}

fn default_enabled() -> bool {
    true
}

/// Configuration for a single MCP server reached over streamable HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpServerEntry {
    /// Unique name for this server (used in logs).
    pub name: String,
    /// Server URL. Defaults to `http://localhost:8051/mcp`.
    pub url: Option<String>,
    /// HTTP headers to set (as [key, value] pairs).
    #[serde(default)]
    pub headers: Vec<[String; 2]>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Number of send retries.
    pub retries: Option<u32>,
    /// Whether this server is enabled. Defaults to true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl McpServerEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            headers: Vec::new(),
            timeout_secs: None,
            retries: None,
            enabled: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Deployments
// ─────────────────────────────────────────────────────────────────────────────

/// A tool that forwards its prompt to a deployment.
///
/// ```toml
/// [[deployments]]
/// name = "summarize"
/// description = "Summarizes long text"
/// deployment = "gpt-4o-mini"
/// system_prompt = "Summarize in three sentences."
/// parameters = { temperature = 0.2 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEntry {
    /// Tool name the model calls.
    pub name: String,
    /// Tool description shown to the model.
    pub description: String,
    /// Target deployment.
    pub deployment: String,
    /// System message sent ahead of the prompt.
    pub system_prompt: Option<String>,
    /// Fixed generation parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = StagehandConfig::from_toml("").unwrap();
        assert!(config.dial.is_none());
        assert!(config.rag.is_none());
        assert!(config.deployments.is_empty());
    }

    #[test]
    fn test_section_defaults() {
        let config = StagehandConfig::from_toml(
            r#"
[dial]
endpoint = "https://dial.example.com"

[rag]
[cache]
[embedding]
"#,
        )
        .unwrap();

        let dial = config.dial.unwrap();
        assert_eq!(dial.endpoint, "https://dial.example.com");
        assert_eq!(dial.api_version, "2025-01-01-preview");
        assert_eq!(dial.timeout_secs, 300);
        assert_eq!(dial.max_retries, 3);

        assert_eq!(config.rag.unwrap(), RagSection::default());

        let cache = config.cache.unwrap();
        assert_eq!(cache.max_documents, 100);
        assert_eq!(cache.ttl_secs, None);
        assert_eq!(cache.cleanup_interval_secs, 60);

        let embedding = config.embedding.unwrap();
        assert_eq!(embedding.provider, EmbeddingProvider::Local);
        assert_eq!(embedding.effective_dimensions(), 384);
    }

    #[test]
    fn test_full_config() {
        let config = StagehandConfig::from_toml(
            r#"
[rag]
deployment = "gpt-4o-mini"
chunk_size = 800
chunk_overlap = 100
top_k = 5

[image]
enabled = false

[files]
page_size = 2000

[cache]
ttl_secs = 3600

[embedding]
provider = "openai"

[embedding.openai]
model = "text-embedding-3-large"
base_url = "http://proxy.local/v1"

[mcp]
[[mcp.servers]]
name = "docs"
url = "http://localhost:8051/mcp"
headers = [["Authorization", "Bearer t"]]
timeout_secs = 10

[[mcp.servers]]
name = "off"
enabled = false

[[deployments]]
name = "summarize"
description = "Summarizes long text"
deployment = "gpt-4o-mini"
system_prompt = "Be brief."
parameters = { temperature = 0.2 }
"#,
        )
        .unwrap();

        let rag = config.rag.unwrap();
        assert_eq!(rag.chunk_size, 800);
        assert_eq!(rag.top_k, 5);

        let image = config.image.unwrap();
        assert!(!image.enabled);
        assert_eq!(image.deployment, "dall-e-3");

        assert_eq!(config.files.unwrap().page_size, 2000);
        assert_eq!(config.cache.unwrap().ttl_secs, Some(3600));

        let embedding = config.embedding.unwrap();
        assert_eq!(embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(embedding.effective_dimensions(), 1536);
        assert_eq!(
            embedding.openai.unwrap().base_url.as_deref(),
            Some("http://proxy.local/v1")
        );

        let mcp = config.mcp.unwrap();
        assert_eq!(mcp.servers.len(), 2);
        assert_eq!(mcp.servers[0].headers[0][0], "Authorization");
        let enabled: Vec<_> = mcp.enabled_servers().map(|s| s.name.as_str()).collect();
        assert_eq!(enabled, vec!["docs"]);

        let deployment = &config.deployments[0];
        assert_eq!(deployment.name, "summarize");
        assert_eq!(deployment.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(deployment.parameters["temperature"], 0.2);
    }

    #[test]
    fn test_mcp_disabled_globally() {
        let config = StagehandConfig::from_toml(
            r#"
[mcp]
enabled = false

[[mcp.servers]]
name = "docs"
"#,
        )
        .unwrap();
        assert_eq!(config.mcp.unwrap().enabled_servers().count(), 0);
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = StagehandConfig::from_toml(
            r#"
[dial]
endpoint = "http://base"

[rag]
top_k = 4
"#,
        )
        .unwrap();
        let overlay = StagehandConfig::from_toml(
            r#"
[rag]
chunk_size = 1000
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.dial.unwrap().endpoint, "http://base");
        // The overlay's section wins whole; its unset keys take defaults.
        let rag = base.rag.unwrap();
        assert_eq!(rag.chunk_size, 1000);
        assert_eq!(rag.top_k, 3);
    }

    #[test]
    fn test_merge_deployments_by_name() {
        let mut base = StagehandConfig::from_toml(
            r#"
[[deployments]]
name = "a"
description = "first"
deployment = "d1"

[[deployments]]
name = "b"
description = "second"
deployment = "d2"
"#,
        )
        .unwrap();
        let overlay = StagehandConfig::from_toml(
            r#"
[[deployments]]
name = "b"
description = "replaced"
deployment = "d3"

[[deployments]]
name = "c"
description = "third"
deployment = "d4"
"#,
        )
        .unwrap();

        base.merge(overlay);
        let names: Vec<_> = base.deployments.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(base.deployments[1].deployment, "d3");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = StagehandConfig::from_toml("[rag]\nchunk_size = 100\nchunk_overlap = 100\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Other(msg) if msg.contains("chunk_overlap")));

        assert!(StagehandConfig::from_toml("[files]\npage_size = 0\n").is_err());
        assert!(StagehandConfig::from_toml("[cache]\nmax_documents = 0\n").is_err());
        assert!(StagehandConfig::from_toml("[rag]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_unknown_provider_is_parse_error() {
        let err = StagehandConfig::from_toml("[embedding]\nprovider = \"quantum\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_plaintext_key_sections() {
        let config = StagehandConfig::from_toml(
            r#"
[dial]
api_key = "secret"

[embedding.openai]
api_key = "sk-secret"
"#,
        )
        .unwrap();
        assert_eq!(
            config.plaintext_key_sections(),
            vec!["[dial]", "[embedding.openai]"]
        );
        assert!(StagehandConfig::new().plaintext_key_sections().is_empty());
    }

    #[test]
    fn test_to_toml_roundtrip_keeps_sections() {
        let config = StagehandConfig {
            rag: Some(RagSection::default()),
            cache: Some(CacheSection {
                ttl_secs: Some(60),
                ..Default::default()
            }),
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("[rag]"));

        let parsed = StagehandConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.rag, config.rag);
        assert_eq!(parsed.cache, config.cache);
    }
}
