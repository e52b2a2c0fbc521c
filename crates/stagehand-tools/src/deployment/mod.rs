//! Tools that forward a prompt to another model deployment.
//!
//! The model calls these tools with a free-text `prompt` plus any extra
//! arguments the target deployment understands. The extras are passed
//! through untouched as `custom_fields.configuration`; the streamed response
//! is mirrored into the transcript and returned as a tool message.

mod image;

pub use image::{DEFAULT_IMAGE_DEPLOYMENT, IMAGE_SHOWN_MESSAGE, ImageGenerationTool};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use stagehand_llm::{ChatMessage, DeploymentRequest, SharedDeploymentClient};

use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::stream::{StreamOutput, stream_to_transcript};
use crate::tool::{ParameterValidationError, Tool, ToolResult, check_description};

/// Split tool arguments into the prompt and the pass-through configuration.
///
/// Every key other than `prompt` ends up in the configuration.
pub fn split_arguments(arguments: Value) -> Result<(String, Map<String, Value>)> {
    let Value::Object(mut configuration) = arguments else {
        return Err(ToolError::invalid_arguments("arguments must be a JSON object"));
    };

    let prompt = match configuration.remove("prompt") {
        Some(Value::String(prompt)) => prompt,
        Some(other) => {
            return Err(
                ParameterValidationError::invalid_type("prompt", "string", other.to_string())
                    .into(),
            );
        }
        None => {
            return Err(ParameterValidationError::missing(
                "prompt",
                "provide the prompt to send to the deployment",
            )
            .into());
        }
    };

    Ok((prompt, configuration))
}

/// Streams a prompt to a named deployment.
#[derive(Clone)]
pub struct DeploymentProxy {
    client: SharedDeploymentClient,
    deployment: String,
    system_prompt: Option<String>,
    parameters: Map<String, Value>,
}

impl DeploymentProxy {
    pub fn new(client: SharedDeploymentClient, deployment: impl Into<String>) -> Self {
        Self {
            client,
            deployment: deployment.into(),
            system_prompt: None,
            parameters: Map::new(),
        }
    }

    /// Send a system message ahead of the prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Fixed generation parameters (`temperature`, `top_p`, ...) sent on every call.
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// The request sent for a given prompt and configuration.
    pub fn request(
        &self,
        prompt: String,
        configuration: Map<String, Value>,
        credential: Option<&str>,
    ) -> DeploymentRequest {
        let mut request = DeploymentRequest::new(&self.deployment);
        if let Some(system_prompt) = &self.system_prompt {
            request = request.with_message(ChatMessage::system(system_prompt));
        }
        request = request
            .with_message(ChatMessage::user(prompt))
            .with_configuration(configuration)
            .with_parameters(self.parameters.clone());
        if let Some(credential) = credential {
            request = request.with_api_key(credential);
        }
        request
    }

    /// Run one call: parse the arguments, stream the deployment's answer into
    /// the transcript and collect it.
    pub async fn run(&self, ctx: &ToolContext) -> Result<StreamOutput> {
        let (prompt, configuration) = split_arguments(ctx.arguments()?)?;
        tracing::debug!(
            deployment = %self.deployment,
            configuration_keys = configuration.len(),
            "forwarding prompt to deployment"
        );

        let request = self.request(prompt, configuration, ctx.credential());
        stream_to_transcript(self.client.as_ref(), request, ctx).await
    }
}

impl std::fmt::Debug for DeploymentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentProxy")
            .field("deployment", &self.deployment)
            .field("client", &self.client.name())
            .field("has_system_prompt", &self.system_prompt.is_some())
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// A configurable tool backed by a [`DeploymentProxy`].
#[derive(Debug)]
pub struct DeploymentTool {
    name: String,
    description: String,
    parameters: Value,
    proxy: DeploymentProxy,
}

impl DeploymentTool {
    /// Create a tool that takes a `prompt` and passes any other argument
    /// through.
    ///
    /// # Errors
    /// If the description is longer than the advertised limit.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        proxy: DeploymentProxy,
    ) -> Result<Self> {
        let name = name.into();
        let description = description.into();
        check_description(&name, &description)?;

        Ok(Self {
            name,
            description,
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The request to send to the model."
                    }
                },
                "required": ["prompt"],
                "additionalProperties": true
            }),
            proxy,
        })
    }

    /// Replace the advertised parameter schema.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn proxy(&self) -> &DeploymentProxy {
        &self.proxy
    }
}

#[async_trait]
impl Tool for DeploymentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult> {
        let output = self.proxy.run(ctx).await?;
        Ok(ToolResult::message(
            output.content,
            output.attachments,
            &ctx.tool_call_id,
        ))
    }
}
