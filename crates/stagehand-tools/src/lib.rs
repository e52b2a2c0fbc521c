//! Tool execution and retrieval for Stagehand.
//!
//! Every capability the model can call implements [`Tool`] and is dispatched
//! through a [`ToolRegistry`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ToolRegistry::dispatch(ToolCall, CallEnvironment)       │
//! └──────────────────────────────────────────────────────────┘
//!      │            │              │              │
//!      ▼            ▼              ▼              ▼
//! ┌─────────┐ ┌───────────┐ ┌────────────┐ ┌────────────┐
//! │ RagTool │ │ Deployment│ │ FileContent│ │ RemoteTool │
//! │         │ │ / Image   │ │ Extraction │ │  (MCP)     │
//! └─────────┘ └───────────┘ └────────────┘ └────────────┘
//!      │            │              │              │
//!      └────────────┴──── ToolContext ────────────┘
//!                  transcript · answer · cancel
//! ```
//!
//! Tools write progress to the transcript as they go and return one
//! [`ToolResult`]. Fatal errors are returned as `Err` and turned into a
//! tool-failure message by the registry.

pub mod context;
pub mod deployment;
pub mod error;
pub mod extract;
pub mod files;
pub mod formats;
pub mod rag;
pub mod registry;
pub mod remote;
pub mod stream;
pub mod tool;

pub use context::{
    AnswerSink, NullSink, RecordingSink, SharedAnswer, SharedTranscript, ToolContext,
    TranscriptEvent, TranscriptSink,
};
pub use deployment::{
    DEFAULT_IMAGE_DEPLOYMENT, DeploymentProxy, DeploymentTool, IMAGE_SHOWN_MESSAGE,
    ImageGenerationTool, split_arguments,
};
pub use error::{Result, ToolError};
pub use extract::{DocumentExtractor, HttpDocumentExtractor, MockExtractor, SharedExtractor};
pub use files::{DEFAULT_PAGE_SIZE, FILE_NOT_FOUND, FileContentExtractionTool, paginate};
pub use formats::DocumentFormat;
pub use rag::{
    Chunker, DEFAULT_RAG_DEPLOYMENT, DEFAULT_TOP_K, IndexCache, RAG_SYSTEM_PROMPT, RagTool,
    RetrievalIndex, RetrievedChunk,
};
pub use registry::{CallEnvironment, ToolCall, ToolRegistry};
pub use remote::{
    RemoteTool, RemoteToolChannel, RemoteToolSpec, ScriptedChannel, SharedChannel,
    discover_remote_tools, tools_from_manager,
};
pub use stream::{StreamOutput, stream_to_transcript};
pub use tool::{
    MAX_DESCRIPTION_CHARS, ParamExt, ParamResult, ParameterValidationError, Tool, ToolResult,
};
