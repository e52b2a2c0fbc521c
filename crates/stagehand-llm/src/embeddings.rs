//! Text embeddings for retrieval.
//!
//! # Implementations
//!
//! - [`MockEmbedder`]: deterministic hash-seeded vectors for tests
//! - [`OpenAiEmbedder`]: any OpenAI-compatible `/embeddings` endpoint
//! - `LocalEmbedder`: ONNX Runtime inference of a sentence-transformer model
//!   (requires the `local-embeddings` feature)

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};

/// Output size of all-MiniLM-L6-v2.
pub const DEFAULT_DIMENSIONS: usize = 384;

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;

    /// Name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// A mock embedder for testing purposes.
///
/// Each lowercased word seeds a pseudo-random unit direction; a text's
/// vector is the normalized sum of its words. The same text always maps to
/// the same vector, and texts sharing words land close together, which is
/// enough to exercise nearest-neighbour retrieval without a model.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let mut words = 0usize;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            add_seeded_direction(&mut embedding, djb2(&word.to_lowercase()));
            words += 1;
        }
        if words == 0 {
            add_seeded_direction(&mut embedding, djb2(text));
        }

        normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn djb2(s: &str) -> u64 {
    s.bytes()
        .fold(5381u64, |hash, b| hash.wrapping_mul(33).wrapping_add(b as u64))
}

fn add_seeded_direction(target: &mut [f32], seed: u64) {
    let mut state = seed;
    for x in target.iter_mut() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *x += ((state >> 33) as f32 / (1u64 << 30) as f32) - 1.0;
    }
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for OpenAI-compatible embeddings.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key; optional for self-hosted endpoints.
    pub api_key: Option<String>,
    /// Base URL for the API.
    pub base_url: String,
    /// Model to use for embeddings.
    pub model: String,
    /// Requested output dimensions, forwarded when set.
    pub dimensions: Option<usize>,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for OpenAiEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiEmbedderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// OpenAI-compatible embeddings client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Internal("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimensions,
        };

        let mut builder = self.client.post(self.embeddings_url()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "Embedding request failed: HTTP {} - {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != texts.len() {
            return Err(LlmError::Backend(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        let mut data = result.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config
            .dimensions
            .unwrap_or(match self.config.model.as_str() {
                "text-embedding-3-large" => 3072,
                _ => 1536,
            })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Local Embedder (ONNX Runtime)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "local-embeddings")]
pub mod local {
    //! Local sentence embeddings using ONNX Runtime.

    use super::*;
    use ort::session::{Session, builder::GraphOptimizationLevel};
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use std::path::Path;
    use tokenizers::{Encoding, Tokenizer};

    /// Longest token sequence fed to the model.
    const MAX_SEQUENCE_LEN: usize = 512;

    /// Sequences per inference call.
    const BATCH_SIZE: usize = 32;

    fn internal<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> LlmError + '_ {
        move |e| LlmError::Internal(format!("{}: {}", context, e))
    }

    /// Local embedder using ONNX Runtime.
    ///
    /// Inference runs on the blocking pool. The session is behind a mutex
    /// because `Session::run` needs exclusive access.
    pub struct LocalEmbedder {
        session: Arc<Mutex<Session>>,
        tokenizer: Arc<Tokenizer>,
        dimensions: usize,
    }

    impl LocalEmbedder {
        /// Load a model (`model.onnx`) and its `tokenizer.json`.
        pub fn load(
            model_path: impl AsRef<Path>,
            tokenizer_path: impl AsRef<Path>,
            dimensions: usize,
        ) -> Result<Self> {
            let model_path = model_path.as_ref();
            let tokenizer_path = tokenizer_path.as_ref();

            let session = Session::builder()
                .map_err(internal("Failed to create ONNX session"))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(internal("Failed to set optimization level"))?
                .commit_from_file(model_path)
                .map_err(|e| {
                    LlmError::Internal(format!(
                        "Failed to load ONNX model from {:?}: {}",
                        model_path, e
                    ))
                })?;

            let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
                LlmError::Internal(format!(
                    "Failed to load tokenizer from {:?}: {}",
                    tokenizer_path, e
                ))
            })?;

            tracing::info!(model = ?model_path, dimensions, "Loaded local embedding model");

            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                tokenizer: Arc::new(tokenizer),
                dimensions,
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_batch(&[text])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| LlmError::Internal("No embedding returned".to_string()))
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
            let session = Arc::clone(&self.session);
            let tokenizer = Arc::clone(&self.tokenizer);

            tokio::task::spawn_blocking(move || {
                let encodings = owned
                    .iter()
                    .map(|text| {
                        tokenizer.encode(text.as_str(), true).map_err(|e| {
                            LlmError::Internal(format!("Tokenization failed: {}", e))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                let mut session = session.lock();
                let mut results = Vec::with_capacity(encodings.len());
                for batch in encodings.chunks(BATCH_SIZE) {
                    results.extend(run_batch(&mut session, batch)?);
                }
                Ok(results)
            })
            .await
            .map_err(|e| LlmError::Internal(format!("Embedding task failed: {}", e)))?
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn name(&self) -> &str {
            "local"
        }
    }

    /// Run one padded batch and mean-pool the token states.
    fn run_batch(session: &mut Session, encodings: &[Encoding]) -> Result<Vec<Vec<f32>>> {
        let batch = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(MAX_SEQUENCE_LEN))
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_ids = vec![0i64; batch * max_len];
        let mut attention_mask = vec![0i64; batch * max_len];
        let mut token_type_ids = vec![0i64; batch * max_len];

        for (i, enc) in encodings.iter().enumerate() {
            let offset = i * max_len;
            let ids = enc.get_ids().iter().take(max_len);
            let mask = enc.get_attention_mask().iter();
            let types = enc.get_type_ids().iter();
            for (j, ((id, m), t)) in ids.zip(mask).zip(types).enumerate() {
                input_ids[offset + j] = *id as i64;
                attention_mask[offset + j] = *m as i64;
                token_type_ids[offset + j] = *t as i64;
            }
        }

        let shape = [batch, max_len];
        let ids_tensor = Tensor::from_array((shape, input_ids)).map_err(internal("Input error"))?;
        let mask_tensor =
            Tensor::from_array((shape, attention_mask.clone())).map_err(internal("Input error"))?;
        let types_tensor =
            Tensor::from_array((shape, token_type_ids)).map_err(internal("Input error"))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => types_tensor,
            ])
            .map_err(internal("ONNX inference failed"))?;

        let (out_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(internal("Output extraction failed"))?;

        // (batch, seq_len, hidden)
        if out_shape.len() != 3 {
            return Err(LlmError::Internal(format!(
                "Unexpected output rank {}",
                out_shape.len()
            )));
        }
        let seq_len = out_shape[1] as usize;
        let hidden = out_shape[2] as usize;

        let mut results = Vec::with_capacity(batch);
        for i in 0..batch {
            let mut pooled = vec![0.0f32; hidden];
            let mut count = 0.0f32;
            for j in 0..seq_len.min(max_len) {
                if attention_mask[i * max_len + j] == 0 {
                    continue;
                }
                let row = &data[(i * seq_len + j) * hidden..(i * seq_len + j + 1) * hidden];
                for (acc, v) in pooled.iter_mut().zip(row) {
                    *acc += v;
                }
                count += 1.0;
            }
            if count > 0.0 {
                for v in &mut pooled {
                    *v /= count;
                }
            }
            normalize(&mut pooled);
            results.push(pooled);
        }

        Ok(results)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic description of an embedder.
///
/// The binary fills this from its configuration so this crate does not
/// depend on `stagehand-config`.
#[derive(Debug, Clone)]
pub struct EmbedderSpec {
    /// Provider name: "local", "openai", or "mock".
    pub provider: String,
    /// Output dimensions.
    pub dimensions: usize,
    /// Local ONNX model path.
    pub local_model_path: Option<PathBuf>,
    /// Local tokenizer.json path.
    pub local_tokenizer_path: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
}

impl Default for EmbedderSpec {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            local_model_path: None,
            local_tokenizer_path: None,
            openai_api_key: None,
            openai_model: None,
            openai_base_url: None,
        }
    }
}

/// Build a [`SharedEmbedder`] from a spec.
///
/// A "local" provider whose model files cannot be found falls back to
/// [`MockEmbedder`] with a warning, as does a build without the
/// `local-embeddings` feature.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    match spec.provider.as_str() {
        "openai" => {
            if spec.openai_api_key.is_none() && spec.openai_base_url.is_none() {
                return Err(LlmError::Config(
                    "OpenAI embedding provider requires an API key. \
                     Configure [embedding.openai] api_key or base_url."
                        .to_string(),
                ));
            }
            let mut config = OpenAiEmbedderConfig {
                api_key: spec.openai_api_key.clone(),
                ..Default::default()
            }
            .with_dimensions(spec.dimensions);
            if let Some(ref model) = spec.openai_model {
                config = config.with_model(model);
            }
            if let Some(ref base_url) = spec.openai_base_url {
                config = config.with_base_url(base_url);
            }
            tracing::info!(model = %config.model, "Using OpenAI-compatible embedder");
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
        "local" => build_local(spec),
        "mock" => Ok(Arc::new(MockEmbedder::new(spec.dimensions))),
        other => Err(LlmError::Config(format!(
            "Unknown embedding provider '{}'. Valid: local, openai, mock",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings")]
fn build_local(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    let (model_path, tokenizer_path) = match (&spec.local_model_path, &spec.local_tokenizer_path)
    {
        (Some(model), Some(tokenizer)) => (model.clone(), tokenizer.clone()),
        _ => match default_local_model_dir() {
            Some(dir) => (dir.join("model.onnx"), dir.join("tokenizer.json")),
            None => (PathBuf::new(), PathBuf::new()),
        },
    };

    if model_path.is_file() && tokenizer_path.is_file() {
        let embedder = local::LocalEmbedder::load(&model_path, &tokenizer_path, spec.dimensions)?;
        return Ok(Arc::new(embedder));
    }

    tracing::warn!(
        model = ?model_path,
        "Local embedding model not found, falling back to mock embedder. \
         Download the all-MiniLM-L6-v2 ONNX model and tokenizer.json to enable it."
    );
    Ok(Arc::new(MockEmbedder::new(spec.dimensions)))
}

#[cfg(not(feature = "local-embeddings"))]
fn build_local(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    tracing::warn!(
        "Local embeddings requested but the 'local-embeddings' feature is not enabled. \
         Falling back to mock embedder."
    );
    Ok(Arc::new(MockEmbedder::new(spec.dimensions)))
}

/// Default directory for local embedding model files.
pub fn default_local_model_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("stagehand").join("models").join("embeddings"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Distances
// ─────────────────────────────────────────────────────────────────────────────

/// Squared Euclidean distance. Mismatched lengths are infinitely far apart.
pub fn squared_euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean (L2) distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean_distance(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_unit_length() {
        let embedder = MockEmbedder::default();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.name(), "mock");

        let embedding = embedder.embed("hello world").await.unwrap();
        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_mock_embedder_deterministic() {
        let embedder = MockEmbedder::new(64);
        let e1 = embedder.embed("test text").await.unwrap();
        let e2 = embedder.embed("test text").await.unwrap();
        assert_eq!(e1, e2);
        assert_ne!(e1, embedder.embed("other words").await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_embedder_shared_words_are_closer() {
        let embedder = MockEmbedder::default();
        let query = embedder.embed("what color is the sky").await.unwrap();
        let near = embedder.embed("The sky is blue on a clear day.").await.unwrap();
        let far = embedder.embed("Rust compiles to native code.").await.unwrap();
        assert!(euclidean_distance(&query, &near) < euclidean_distance(&query, &far));
    }

    #[tokio::test]
    async fn test_mock_embedder_punctuation_only() {
        let embedder = MockEmbedder::new(16);
        let e = embedder.embed("...").await.unwrap();
        assert_eq!(e.len(), 16);
        assert!(e.iter().any(|x| *x != 0.0));
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = MockEmbedder::default();
        let batch = embedder.embed_batch(&["one", "two", "three"]).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1], embedder.embed("two").await.unwrap());
    }

    #[test]
    fn test_distances() {
        let a = [0.0, 0.0, 0.0];
        let b = [3.0, 4.0, 0.0];
        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-6);
        assert!((squared_euclidean_distance(&a, &b) - 25.0).abs() < 1e-6);
        assert_eq!(squared_euclidean_distance(&a, &[1.0]), f32::INFINITY);
    }

    #[test]
    fn test_openai_embedder_config_builder() {
        let config = OpenAiEmbedderConfig::new("key")
            .with_base_url("http://custom.api/v1")
            .with_model("text-embedding-3-large");
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.base_url, "http://custom.api/v1");

        let embedder = OpenAiEmbedder::new(config.clone()).unwrap();
        assert_eq!(embedder.dimensions(), 3072);
        assert_eq!(embedder.embeddings_url(), "http://custom.api/v1/embeddings");

        let embedder = OpenAiEmbedder::new(config.with_dimensions(384)).unwrap();
        assert_eq!(embedder.dimensions(), 384);
    }

    #[test]
    fn test_build_embedder_mock() {
        let spec = EmbedderSpec {
            provider: "mock".into(),
            dimensions: 32,
            ..Default::default()
        };
        let embedder = build_embedder(&spec).unwrap();
        assert_eq!(embedder.name(), "mock");
        assert_eq!(embedder.dimensions(), 32);
    }

    #[test]
    fn test_build_embedder_local_falls_back() {
        let spec = EmbedderSpec {
            provider: "local".into(),
            local_model_path: Some("/nonexistent/model.onnx".into()),
            local_tokenizer_path: Some("/nonexistent/tokenizer.json".into()),
            ..Default::default()
        };
        let embedder = build_embedder(&spec).unwrap();
        assert_eq!(embedder.name(), "mock");
        assert_eq!(embedder.dimensions(), 384);
    }

    #[test]
    fn test_build_embedder_errors() {
        let unknown = EmbedderSpec {
            provider: "quantum".into(),
            ..Default::default()
        };
        assert!(matches!(build_embedder(&unknown), Err(LlmError::Config(_))));

        let openai_without_key = EmbedderSpec {
            provider: "openai".into(),
            ..Default::default()
        };
        assert!(matches!(
            build_embedder(&openai_without_key),
            Err(LlmError::Config(_))
        ));
    }
}
