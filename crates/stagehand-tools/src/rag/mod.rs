//! Retrieval-augmented answers over a single document.
//!
//! ```text
//!   request, file_url
//!         │
//!         ▼
//!   DocumentCache ──hit──────────────────────┐
//!         │ miss                             │
//!         ▼                                  │
//!   extract ─► chunk ─► embed ─► FlatL2Index │
//!         │                                  │
//!         └──────────► RetrievalIndex ◄──────┘
//!                            │ top-k
//!                            ▼
//!                  augmented prompt ─► deployment stream ─► answer
//! ```
//!
//! Indexes are cached per `(conversation, document)` so follow-up questions
//! about the same file skip extraction and embedding.

mod chunker;
mod index;
mod prompt;

pub use chunker::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use index::{BLOCKING_SEARCH_THRESHOLD, FlatL2Index, RetrievalIndex, RetrievedChunk};
pub use prompt::{RAG_SYSTEM_PROMPT, augmented_prompt};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use stagehand_cache::{DocumentCache, DocumentKey};
use stagehand_llm::{ChatMessage, DeploymentRequest, SharedDeploymentClient, SharedEmbedder};

use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::extract::{SharedExtractor, non_empty};
use crate::files::FILE_NOT_FOUND;
use crate::stream::stream_to_transcript;
use crate::tool::{RagParams, Tool, ToolResult};

/// Deployment that writes the answer.
pub const DEFAULT_RAG_DEPLOYMENT: &str = "gpt-4o";

/// Chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

/// Transcript note when a document has no text.
const NO_TEXT_NOTE: &str = "No text content could be extracted from the file.";

const DESCRIPTION: &str = "Performs semantic search on documents to find and answer questions \
based on relevant content. Supports: PDF, TXT, CSV, HTML. Use this when you need to find \
information in a document and answer questions based on it.";

/// Cache of built retrieval indexes.
pub type IndexCache = DocumentCache<Arc<RetrievalIndex>>;

/// Why an index was not built.
enum BuildError {
    /// The document has no text. Reported to the model, not cached.
    NoContent,
    Failed(ToolError),
}

impl From<ToolError> for BuildError {
    fn from(err: ToolError) -> Self {
        BuildError::Failed(err)
    }
}

/// Answers questions about a document from its most relevant chunks.
pub struct RagTool {
    client: SharedDeploymentClient,
    embedder: SharedEmbedder,
    extractor: SharedExtractor,
    cache: IndexCache,
    chunker: Chunker,
    deployment: String,
    top_k: usize,
}

impl RagTool {
    pub fn new(
        client: SharedDeploymentClient,
        embedder: SharedEmbedder,
        extractor: SharedExtractor,
        cache: IndexCache,
    ) -> Self {
        Self {
            client,
            embedder,
            extractor,
            cache,
            chunker: Chunker::default(),
            deployment: DEFAULT_RAG_DEPLOYMENT.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Use a different answering deployment.
    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = deployment.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    async fn build_index(
        &self,
        file_url: &str,
        credential: Option<&str>,
    ) -> std::result::Result<Arc<RetrievalIndex>, BuildError> {
        let text = non_empty(self.extractor.extract_text(file_url, credential).await?)
            .ok_or(BuildError::NoContent)?;

        let chunks = self.chunker.split(&text)?;
        if chunks.is_empty() {
            return Err(BuildError::NoContent);
        }

        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self
            .embedder
            .embed_batch(&refs)
            .await
            .map_err(ToolError::from)?;

        let index = RetrievalIndex::build(chunks, embeddings, self.embedder.dimensions())?;
        tracing::debug!(
            file_url = %file_url,
            chunks = index.len(),
            embedder = self.embedder.name(),
            "built retrieval index"
        );
        Ok(Arc::new(index))
    }
}

impl std::fmt::Debug for RagTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagTool")
            .field("deployment", &self.deployment)
            .field("top_k", &self.top_k)
            .field("chunker", &self.chunker)
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for RagTool {
    fn name(&self) -> &str {
        "rag_tool"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "The search query or question to search for in the document."
                },
                "file_url": {
                    "type": "string",
                    "description": "URL of the file to perform RAG on."
                }
            },
            "required": ["request", "file_url"]
        })
    }

    fn show_in_stage(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult> {
        let params = RagParams::try_from(ctx.arguments()?)?;
        let transcript = &ctx.transcript;

        transcript.append_content("## Request arguments: \n");
        transcript.append_content(&format!("**Request**: {}\n\r", params.request));
        transcript.append_content(&format!("**File URL**: {}\n\r", params.file_url));

        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let key = DocumentKey::new(&ctx.conversation_id, &params.file_url);
        let built = self
            .cache
            .get_or_try_insert_with(&key, || {
                self.build_index(&params.file_url, ctx.credential())
            })
            .await;

        let index = match built {
            Ok(index) => index,
            Err(BuildError::NoContent) => {
                tracing::debug!(key = %key, "no text extracted, nothing cached");
                transcript.append_content(NO_TEXT_NOTE);
                return Ok(ToolResult::text(FILE_NOT_FOUND));
            }
            Err(BuildError::Failed(e)) => return Err(e),
        };

        let query = self.embedder.embed(&params.request).await?;
        let hits = index.search_async(query, self.top_k).await?;
        tracing::trace!(key = %key, retrieved = hits.len(), "retrieved chunks");

        let prompt = augmented_prompt(&params.request, &hits);
        transcript.append_content("## RAG Request: \n");
        transcript.append_content(&format!("```text\n\r{prompt}\n\r```\n\r"));
        transcript.append_content("## Response: \n");

        let mut request = DeploymentRequest::new(&self.deployment)
            .with_message(ChatMessage::system(RAG_SYSTEM_PROMPT))
            .with_message(ChatMessage::user(prompt));
        if let Some(credential) = ctx.credential() {
            request = request.with_api_key(credential);
        }

        let output = stream_to_transcript(self.client.as_ref(), request, ctx).await?;
        Ok(ToolResult::text(output.content))
    }
}
