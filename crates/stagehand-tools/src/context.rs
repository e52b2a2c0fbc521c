//! Per-call execution context and the output sinks tools write to.
//!
//! A [`ToolContext`] is built fresh for every tool invocation. It carries the
//! caller's credential, the conversation the call belongs to, the raw argument
//! string and two sinks:
//!
//! - the **transcript** ([`TranscriptSink`]): an append-only log of what the
//!   tool is doing, rendered to the user as it streams;
//! - the **answer** ([`AnswerSink`]): the final answer shown to the user,
//!   used by tools that need to place content there directly (images).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use stagehand_llm::Attachment;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ToolError};

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only sink for a tool's intermediate output.
pub trait TranscriptSink: Send + Sync {
    /// Append text to the transcript.
    fn append_content(&self, text: &str);

    /// Record an attachment in the transcript.
    fn add_attachment(&self, attachment: &Attachment);
}

/// Sink for content that belongs in the final answer.
pub trait AnswerSink: Send + Sync {
    fn append_content(&self, text: &str);
}

/// A transcript sink shared across the call.
pub type SharedTranscript = Arc<dyn TranscriptSink>;

/// An answer sink shared across the call.
pub type SharedAnswer = Arc<dyn AnswerSink>;

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TranscriptSink for NullSink {
    fn append_content(&self, _text: &str) {}

    fn add_attachment(&self, _attachment: &Attachment) {}
}

impl AnswerSink for NullSink {
    fn append_content(&self, _text: &str) {}
}

/// One write made to a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    Content(String),
    Attachment(Attachment),
}

/// A sink that keeps every write in order.
///
/// Useful in tests and for callers that render the transcript after the
/// call completes.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<TranscriptEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes, in order.
    pub fn events(&self) -> Vec<TranscriptEvent> {
        self.events.lock().clone()
    }

    /// Every text write concatenated.
    pub fn content(&self) -> String {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TranscriptEvent::Content(text) => Some(text.as_str()),
                TranscriptEvent::Attachment(_) => None,
            })
            .collect()
    }

    /// Every text write, one entry per call.
    pub fn content_writes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TranscriptEvent::Content(text) => Some(text.clone()),
                TranscriptEvent::Attachment(_) => None,
            })
            .collect()
    }

    /// Every recorded attachment.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TranscriptEvent::Attachment(attachment) => Some(attachment.clone()),
                TranscriptEvent::Content(_) => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl TranscriptSink for RecordingSink {
    fn append_content(&self, text: &str) {
        self.events
            .lock()
            .push(TranscriptEvent::Content(text.to_string()));
    }

    fn add_attachment(&self, attachment: &Attachment) {
        self.events
            .lock()
            .push(TranscriptEvent::Attachment(attachment.clone()));
    }
}

impl AnswerSink for RecordingSink {
    fn append_content(&self, text: &str) {
        self.events
            .lock()
            .push(TranscriptEvent::Content(text.to_string()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to a tool for one invocation.
#[derive(Clone)]
pub struct ToolContext {
    /// Caller credential, forwarded to downstream services.
    pub credential: Option<String>,
    /// Conversation the call belongs to. Scopes cached documents.
    pub conversation_id: String,
    /// Unparsed JSON arguments as produced by the model.
    pub raw_arguments: String,
    /// ID of the tool call being answered.
    pub tool_call_id: String,
    /// Intermediate output.
    pub transcript: SharedTranscript,
    /// Final-answer output.
    pub answer: SharedAnswer,
    /// Token to check for cancellation.
    pub cancellation: CancellationToken,
}

impl ToolContext {
    /// Create a context with discarding sinks and a fresh cancellation token.
    pub fn new(conversation_id: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            credential: None,
            conversation_id: conversation_id.into(),
            raw_arguments: raw_arguments.into(),
            tool_call_id: String::new(),
            transcript: Arc::new(NullSink),
            answer: Arc::new(NullSink),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = id.into();
        self
    }

    pub fn with_transcript(mut self, transcript: SharedTranscript) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_answer(mut self, answer: SharedAnswer) -> Self {
        self.answer = answer;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Parse the raw arguments.
    ///
    /// An empty argument string is treated as `{}`. Anything that is not
    /// valid JSON is an [`ToolError::InvalidArguments`].
    pub fn arguments(&self) -> Result<Value> {
        let raw = self.raw_arguments.trim();
        if raw.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(raw).map_err(|e| {
            ToolError::invalid_arguments(format!("arguments are not valid JSON: {e}"))
        })
    }

    /// The credential, if one was supplied.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Check if execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new("default", "{}")
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("conversation_id", &self.conversation_id)
            .field("tool_call_id", &self.tool_call_id)
            .field("raw_arguments", &self.raw_arguments)
            .field("has_credential", &self.credential.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_parsing() {
        let ctx = ToolContext::new("conv", r#"{"file_url": "files/a.txt", "page": 2}"#);
        let args = ctx.arguments().unwrap();
        assert_eq!(args["file_url"], "files/a.txt");
        assert_eq!(args["page"], 2);
    }

    #[test]
    fn test_empty_arguments_are_empty_object() {
        let ctx = ToolContext::new("conv", "  ");
        assert_eq!(ctx.arguments().unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_malformed_arguments() {
        let ctx = ToolContext::new("conv", "{not json");
        assert!(matches!(
            ctx.arguments(),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        TranscriptSink::append_content(&sink, "a");
        sink.add_attachment(&Attachment::url("image/png", "files/x.png"));
        TranscriptSink::append_content(&sink, "b");

        assert_eq!(sink.content(), "ab");
        assert_eq!(sink.content_writes(), vec!["a", "b"]);
        assert_eq!(sink.attachments().len(), 1);
        assert!(matches!(sink.events()[1], TranscriptEvent::Attachment(_)));
    }

    #[test]
    fn test_context_debug_hides_credential() {
        let ctx = ToolContext::new("conv", "{}").with_credential("secret-key");
        let debug = format!("{ctx:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("has_credential: true"));
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let ctx = ToolContext::new("conv", "{}").with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
