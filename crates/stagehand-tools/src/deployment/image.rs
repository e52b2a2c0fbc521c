//! Image generation through an image deployment.

use async_trait::async_trait;
use serde_json::{Value, json};
use stagehand_llm::SharedDeploymentClient;

use super::DeploymentProxy;
use crate::context::ToolContext;
use crate::error::Result;
use crate::tool::{Tool, ToolResult};

/// Image deployment used by default.
pub const DEFAULT_IMAGE_DEPLOYMENT: &str = "dall-e-3";

/// Tool content when the deployment sent attachments but no text. Tells
/// the model the user already sees the picture.
pub const IMAGE_SHOWN_MESSAGE: &str =
    "The image has been successfully generated according to request and shown to user!";

const DESCRIPTION: &str = "Generates images from a text description using an image model. \
Pass a detailed, specific prompt describing the desired image; optional size, style and quality \
arguments customize the output. The generated image is shown to the user directly, so do not \
repeat it in your answer. Use this whenever a textual description needs to become a picture: \
illustrations, concept art, diagrams or any other visual content.";

/// Generates images and places them in the final answer.
///
/// PNG and JPEG attachments returned by the deployment are rendered into
/// the answer sink as markdown images; everything else stays a plain
/// attachment on the tool message.
#[derive(Debug)]
pub struct ImageGenerationTool {
    proxy: DeploymentProxy,
}

impl ImageGenerationTool {
    pub fn new(client: SharedDeploymentClient) -> Self {
        Self::with_deployment(client, DEFAULT_IMAGE_DEPLOYMENT)
    }

    pub fn with_deployment(client: SharedDeploymentClient, deployment: impl Into<String>) -> Self {
        Self {
            proxy: DeploymentProxy::new(client, deployment),
        }
    }

    pub fn deployment(&self) -> &str {
        self.proxy.deployment()
    }
}

#[async_trait]
impl Tool for ImageGenerationTool {
    fn name(&self) -> &str {
        "image_generation_tool"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Extensive description of the image that should be generated."
                },
                "size": {
                    "type": "string",
                    "description": "The size of the generated image.",
                    "enum": ["1024x1024", "1024x1792", "1792x1024"],
                    "default": "1024x1024"
                },
                "style": {
                    "type": "string",
                    "description": "The style of the generated image. `vivid` leans towards \
                        hyperrealistic and dramatic images; `natural` produces more natural, \
                        less realistic looking images.",
                    "enum": ["natural", "vivid"],
                    "default": "natural"
                },
                "quality": {
                    "type": "string",
                    "description": "The quality of the generated image. `hd` creates images \
                        with finer details and greater consistency across the image.",
                    "enum": ["standard", "hd"],
                    "default": "standard"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, ctx: &ToolContext) -> Result<ToolResult> {
        let output = self.proxy.run(ctx).await?;

        let mut shown = 0usize;
        for attachment in output.attachments.iter().filter(|a| a.is_inline_image()) {
            if let Some(url) = &attachment.url {
                ctx.answer.append_content(&format!("\n\r![image]({url})\n\r"));
                shown += 1;
            }
        }
        tracing::debug!(
            deployment = %self.proxy.deployment(),
            attachments = output.attachments.len(),
            shown,
            "image generation finished"
        );

        let content = if output.content.is_empty() && !output.attachments.is_empty() {
            IMAGE_SHOWN_MESSAGE.to_string()
        } else {
            output.content
        };

        Ok(ToolResult::message(
            content,
            output.attachments,
            &ctx.tool_call_id,
        ))
    }
}
