//! Error types for tool execution.

use thiserror::Error;

use crate::tool::ParameterValidationError;

/// Result type alias using the tool error type.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Fatal errors from tool execution.
///
/// Recoverable problems (a bad page number, a document without text) are not
/// errors; tools report them as result content so the model can react.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Downstream deployment or embedding error.
    #[error("LLM error: {0}")]
    Llm(#[from] stagehand_llm::LlmError),

    /// Remote tool server error.
    #[error("Remote tool error: {0}")]
    Remote(#[from] stagehand_mcp::McpError),

    /// Arguments could not be parsed or are missing required fields.
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Document download or decoding failed.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The call was cancelled.
    #[error("Tool call cancelled")]
    Cancelled,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create an invalid arguments error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create an extraction error.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<ParameterValidationError> for ToolError {
    fn from(err: ParameterValidationError) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}
