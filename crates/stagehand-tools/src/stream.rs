//! Folding a streamed deployment response into the transcript.

use futures::StreamExt;
use stagehand_llm::{Attachment, DeploymentClient, DeploymentRequest};

use crate::context::ToolContext;
use crate::error::{Result, ToolError};

/// Everything a finished deployment stream produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamOutput {
    /// All text increments, concatenated.
    pub content: String,
    /// All attachments, in arrival order.
    pub attachments: Vec<Attachment>,
}

/// Run a streaming request and mirror it into the context's transcript.
///
/// Each text increment is appended to the transcript as it arrives and
/// accumulated. Each attachment is recorded and mirrored with
/// `add_attachment`. Once the context is cancelled no further writes are
/// made and the call fails with [`ToolError::Cancelled`]; output written
/// before that stays in the transcript.
pub async fn stream_to_transcript(
    client: &dyn DeploymentClient,
    request: DeploymentRequest,
    ctx: &ToolContext,
) -> Result<StreamOutput> {
    let deployment = request.deployment.clone();
    let cancel = &ctx.cancellation;

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ToolError::Cancelled),
        stream = client.stream(request) => stream?,
    };

    let mut output = StreamOutput::default();
    let mut increments = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(
                    deployment = %deployment,
                    increments,
                    "deployment stream cancelled"
                );
                return Err(ToolError::Cancelled);
            }
            next = stream.next() => next,
        };

        let Some(delta) = next else { break };
        let delta = delta?;
        increments += 1;

        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            ctx.transcript.append_content(&text);
            output.content.push_str(&text);
        }
        for attachment in delta.attachments {
            ctx.transcript.add_attachment(&attachment);
            output.attachments.push(attachment);
        }
    }

    tracing::trace!(
        deployment = %deployment,
        increments,
        chars = output.content.chars().count(),
        attachments = output.attachments.len(),
        "deployment stream finished"
    );

    Ok(output)
}
