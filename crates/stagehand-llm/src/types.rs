//! Request and response types for deployment calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content types rendered inline as images.
pub const INLINE_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg"];

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A file or link produced by a deployment (an image, a document, ...).
///
/// Either `data` (inline payload) or `url` is normally set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type, e.g. `image/png`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
}

impl Attachment {
    /// Create a URL attachment.
    pub fn url(content_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Whether this attachment should be rendered inline as an image.
    pub fn is_inline_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|t| INLINE_IMAGE_TYPES.contains(&t))
    }
}

/// One increment of a streamed deployment response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentDelta {
    /// Text content, if this increment carries any.
    pub content: Option<String>,
    /// Attachments carried by this increment.
    pub attachments: Vec<Attachment>,
}

impl DeploymentDelta {
    /// A text-only increment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            attachments: Vec::new(),
        }
    }

    /// An attachment-only increment.
    pub fn attachment(attachment: Attachment) -> Self {
        Self {
            content: None,
            attachments: vec![attachment],
        }
    }

    /// True if the increment carries neither text nor attachments.
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().is_none_or(str::is_empty) && self.attachments.is_empty()
    }
}

/// A streaming chat request against a named deployment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentRequest {
    /// Deployment name, e.g. `gpt-4o` or `dall-e-3`.
    pub deployment: String,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Opaque configuration forwarded as `custom_fields.configuration`.
    pub configuration: Option<Map<String, Value>>,
    /// Fixed generation parameters (`temperature`, `top_p`, ...).
    pub parameters: Map<String, Value>,
    /// Caller credential forwarded downstream.
    pub api_key: Option<String>,
}

impl DeploymentRequest {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_configuration(mut self, configuration: Map<String, Value>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}
