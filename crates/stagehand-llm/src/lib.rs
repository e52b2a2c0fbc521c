//! Downstream model access for Stagehand tools.
//!
//! Two seams live here:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  DeploymentClient trait                  │
//! │  - stream(request) -> Stream<Delta>      │
//! └──────────────────────────────────────────┘
//!          │                     │
//!          ▼                     ▼
//!    ┌────────────┐      ┌──────────────────┐
//!    │ DialClient │      │ MockDeployment…  │
//!    └────────────┘      └──────────────────┘
//!
//! ┌──────────────────────────────────────────┐
//! │  Embedder trait                          │
//! │  - embed / embed_batch -> Vec<f32>       │
//! └──────────────────────────────────────────┘
//!      │              │              │
//!      ▼              ▼              ▼
//!  ┌───────┐    ┌──────────┐    ┌────────┐
//!  │ Local │    │  OpenAI  │    │  Mock  │
//!  └───────┘    └──────────┘    └────────┘
//! ```
//!
//! Deltas carry text and attachments; callers fold them into transcripts
//! and tool results.

pub mod deployment;
pub mod dial;
pub mod embeddings;
pub mod error;
pub mod types;

pub use deployment::{
    DeltaStream, DeploymentClient, MockDeploymentClient, MockResponse, SharedDeploymentClient,
    with_retry,
};
pub use dial::{DialClient, DialConfig};
pub use error::{LlmError, RateLimitInfo, Result};
pub use types::{Attachment, ChatMessage, DeploymentDelta, DeploymentRequest, Role};

pub use embeddings::{
    Embedder, EmbedderSpec, MockEmbedder, OpenAiEmbedder, OpenAiEmbedderConfig, SharedEmbedder,
    build_embedder, euclidean_distance, squared_euclidean_distance,
};

#[cfg(feature = "local-embeddings")]
pub use embeddings::local::LocalEmbedder;
