//! Tool framework.
//!
//! This module defines the [`Tool`] trait every tool implements, the
//! [`ToolResult`] it returns and the parameter helpers tools use to read
//! their arguments.
//!
//! # Example
//!
//! ```rust,ignore
//! use stagehand_tools::{Tool, ToolContext, ToolResult, ToolRegistry};
//!
//! struct EchoTool;
//!
//! #[async_trait]
//! impl Tool for EchoTool {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Echo the text argument" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult> {
//!         let args = ctx.arguments()?;
//!         Ok(ToolResult::text(args.required_str("text", "provide text")?))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(EchoTool);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stagehand_llm::{Attachment, Role};

use crate::context::ToolContext;
use crate::error::{Result, ToolError};

/// Longest description a tool may advertise.
pub const MAX_DESCRIPTION_CHARS: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool parameter validation failures.
///
/// Messages are phrased for the model, so it can correct the call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParameterValidationError {
    /// A required parameter is missing.
    #[error("missing required parameter '{name}': {hint}")]
    MissingRequired {
        name: &'static str,
        /// Hint for the model on how to fix the call.
        hint: &'static str,
    },

    /// A parameter has an invalid type.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// A parameter value is out of range.
    #[error("'{name}' value {value} is out of range: {constraint}")]
    OutOfRange {
        name: &'static str,
        value: String,
        constraint: String,
    },

    /// Multiple validation errors.
    #[error("parameter validation failed: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ParameterValidationError>),
}

impl ParameterValidationError {
    /// Create a missing required parameter error.
    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { name, hint }
    }

    /// Create an invalid type error.
    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: actual.into(),
        }
    }

    /// Create an out of range error.
    pub fn out_of_range(
        name: &'static str,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            name,
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Create from multiple errors.
    pub fn multiple(errors: Vec<ParameterValidationError>) -> Self {
        Self::Multiple(errors)
    }

    /// The parameter this error is about, if it concerns a single one.
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            Self::MissingRequired { name, .. } => Some(name),
            Self::InvalidType { name, .. } => Some(name),
            Self::OutOfRange { name, .. } => Some(name),
            Self::Multiple(_) => None,
        }
    }
}

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helper trait for extracting and validating parameters from JSON.
pub trait ParamExt {
    /// Get a required string parameter.
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str>;

    /// Get an optional string parameter.
    fn optional_str(&self, name: &str) -> Option<&str>;

    /// Get an integer parameter, falling back to `default`.
    ///
    /// Integers sent as strings (`"2"`) are accepted. A missing value or any
    /// other non-integer yields `default`.
    fn lenient_i64(&self, name: &str, default: i64) -> i64;
}

impl ParamExt for serde_json::Value {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => {
                Err(ParameterValidationError::missing(name, hint))
            }
            Some(value) => value
                .as_str()
                .ok_or_else(|| ParameterValidationError::invalid_type(name, "string", json_type(value))),
        }
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    fn lenient_i64(&self, name: &str, default: i64) -> i64 {
        let parsed = match self.get(name) {
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            Some(value) => value.as_i64(),
            None => None,
        };
        parsed.unwrap_or(default)
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed Parameter Structs
// ─────────────────────────────────────────────────────────────────────────────

/// Validated parameters for the retrieval tool.
#[derive(Debug, Clone)]
pub struct RagParams {
    /// The question to answer from the document.
    pub request: String,
    /// URL of the document to search.
    pub file_url: String,
}

impl TryFrom<serde_json::Value> for RagParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        let request = params.required_str("request", "provide the question to search for")?;
        let file_url = params.required_str("file_url", "provide the URL of the file to search")?;

        Ok(Self {
            request: request.to_string(),
            file_url: file_url.to_string(),
        })
    }
}

/// Validated parameters for the file content extraction tool.
///
/// `page` is kept as given; clamping happens during pagination.
#[derive(Debug, Clone)]
pub struct FileContentParams {
    pub file_url: String,
    pub page: i64,
}

impl TryFrom<serde_json::Value> for FileContentParams {
    type Error = ParameterValidationError;

    fn try_from(params: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        let file_url = params.required_str("file_url", "provide the URL of the file to read")?;
        let page = params.lenient_i64("page", 1);

        Ok(Self {
            file_url: file_url.to_string(),
            page,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for tools the model can call.
///
/// Metadata (`name`, `description`, `parameters`) is fixed for the tool's
/// lifetime. `execute` is the only operation with side effects: it may write
/// to the context's sinks any number of times and returns exactly one result.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name, used in the tool-call schema.
    fn name(&self) -> &str;

    /// What the tool does and when to use it. At most
    /// [`MAX_DESCRIPTION_CHARS`] characters.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> serde_json::Value;

    /// Whether the caller should render the raw result in the transcript.
    ///
    /// Tools that write their own structured transcript return `false`.
    fn show_in_stage(&self) -> bool {
        true
    }

    /// Execute the tool.
    ///
    /// # Errors
    /// Fatal problems only: unparsable arguments, downstream failures and
    /// cancellation. Problems the model can fix are reported in the result.
    async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult>;
}

/// Check a description against [`MAX_DESCRIPTION_CHARS`].
pub fn check_description(name: &str, description: &str) -> Result<()> {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(ToolError::internal(format!(
            "description of '{name}' is {len} characters, limit is {MAX_DESCRIPTION_CHARS}"
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    /// Plain text for the model.
    Text { content: String },
    /// A structured tool message, carrying attachments.
    Message {
        role: Role,
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
        tool_call_id: String,
    },
}

impl ToolResult {
    /// Create a text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a tool-role message result.
    pub fn message(
        content: impl Into<String>,
        attachments: Vec<Attachment>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self::Message {
            role: Role::Tool,
            content: content.into(),
            attachments,
            tool_call_id: tool_call_id.into(),
        }
    }

    /// The failure message the model sees when a call errors out.
    pub fn failure(error: &ToolError, tool_call_id: impl Into<String>) -> Self {
        Self::message(format!("Error: {error}"), Vec::new(), tool_call_id)
    }

    /// The text content.
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } | Self::Message { content, .. } => content,
        }
    }

    /// Attachments, empty for text results.
    pub fn attachments(&self) -> &[Attachment] {
        match self {
            Self::Text { .. } => &[],
            Self::Message { attachments, .. } => attachments,
        }
    }

    /// The tool call this message answers, for message results.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Message { tool_call_id, .. } => Some(tool_call_id),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A mock tool for testing.
///
/// Returns a configurable response (or error) and records the raw arguments
/// of every call.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
    response: parking_lot::Mutex<Option<ToolResult>>,
    failure: Option<String>,
    calls: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "A mock tool for testing".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            response: parking_lot::Mutex::new(None),
            failure: None,
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_response(self, response: ToolResult) -> Self {
        *self.response.lock() = Some(response);
        self
    }

    /// Fail every call with an internal error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.lock().push(ctx.raw_arguments.clone());
        ctx.arguments()?;

        if let Some(message) = &self.failure {
            return Err(ToolError::internal(message.clone()));
        }

        Ok(self
            .response
            .lock()
            .clone()
            .unwrap_or_else(|| ToolResult::text("mock response")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
