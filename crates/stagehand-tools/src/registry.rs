//! Tool registry and call dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::context::{NullSink, SharedAnswer, SharedTranscript, ToolContext};
use crate::error::ToolError;
use crate::tool::{Tool, ToolResult};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Unparsed JSON arguments.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Everything about a call that comes from the surrounding request rather
/// than from the model.
#[derive(Clone)]
pub struct CallEnvironment {
    pub conversation_id: String,
    pub credential: Option<String>,
    pub transcript: SharedTranscript,
    pub answer: SharedAnswer,
    pub cancellation: CancellationToken,
}

impl CallEnvironment {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            credential: None,
            transcript: Arc::new(NullSink),
            answer: Arc::new(NullSink),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
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

    /// Build the per-call context for one tool call.
    pub fn context_for(&self, call: &ToolCall) -> ToolContext {
        ToolContext {
            credential: self.credential.clone(),
            conversation_id: self.conversation_id.clone(),
            raw_arguments: call.arguments.clone(),
            tool_call_id: call.id.clone(),
            transcript: Arc::clone(&self.transcript),
            answer: Arc::clone(&self.answer),
            cancellation: self.cancellation.clone(),
        }
    }
}

impl std::fmt::Debug for CallEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallEnvironment")
            .field("conversation_id", &self.conversation_id)
            .field("has_credential", &self.credential.is_some())
            .finish_non_exhaustive()
    }
}

/// Registry of the tools available to the model.
///
/// Tools are created once at startup and shared read-only across requests.
/// Local and remote tools are registered the same way.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it is replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool registered twice, replacing the earlier one");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions in OpenAI function-calling form, sorted by name.
    pub fn definitions(&self) -> Vec<Value> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    }
                })
            })
            .collect()
    }

    /// Execute a tool call.
    ///
    /// Never fails: fatal errors, including an unknown tool name, become a
    /// tool message reading `Error: ...` so the conversation can continue.
    pub async fn dispatch(&self, call: &ToolCall, env: &CallEnvironment) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            let err = ToolError::ToolNotFound(call.name.clone());
            tracing::warn!(tool = %call.name, call_id = %call.id, "model called unknown tool");
            return ToolResult::failure(&err, &call.id);
        };

        let ctx = env.context_for(call);
        tracing::debug!(
            tool = %call.name,
            call_id = %call.id,
            conversation = %env.conversation_id,
            "dispatching tool call"
        );

        match tool.execute(&ctx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                ToolResult::failure(&e, &call.id)
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
