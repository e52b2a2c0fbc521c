//! Registry-level scenarios for the file, deployment and image tools.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use stagehand_llm::{
    Attachment, DeltaStream, DeploymentClient, DeploymentDelta, DeploymentRequest,
    MockDeploymentClient, MockResponse,
};
use stagehand_tools::{
    CallEnvironment, DeploymentProxy, DeploymentTool, FILE_NOT_FOUND, FileContentExtractionTool,
    IMAGE_SHOWN_MESSAGE, ImageGenerationTool, MockExtractor, RecordingSink, Tool, ToolCall,
    ToolContext, ToolError, ToolRegistry, ToolResult,
};
use tokio_util::sync::CancellationToken;

fn digits(len: usize) -> String {
    (0..len).map(|i| char::from(b'0' + (i % 10) as u8)).collect()
}

fn file_registry(extractor: MockExtractor) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FileContentExtractionTool::new(Arc::new(extractor)));
    registry
}

fn file_call(page: serde_json::Value) -> ToolCall {
    ToolCall::new(
        "call_file",
        "file_content_extractor",
        json!({"file_url": "files/big.txt", "page": page}).to_string(),
    )
}

#[tokio::test]
async fn test_pagination_over_registry() {
    let text = digits(25_000);
    let registry =
        file_registry(MockExtractor::new().with_document("files/big.txt", text.clone()));
    let env = CallEnvironment::new("conv");

    let first = registry.dispatch(&file_call(json!(1)), &env).await;
    assert_eq!(
        first.content(),
        format!("{}\n\n**Page #1. Total pages: 3**", &text[..10_000])
    );

    let last = registry.dispatch(&file_call(json!(3)), &env).await;
    assert_eq!(
        last.content(),
        format!("{}\n\n**Page #3. Total pages: 3**", &text[20_000..])
    );

    let beyond = registry.dispatch(&file_call(json!(4)), &env).await;
    assert_eq!(beyond.content(), "Error: Page 4 does not exist. Total pages: 3");
}

#[tokio::test]
async fn test_file_tool_transcript_and_missing_file() {
    let registry = file_registry(MockExtractor::new().with_document("files/a.txt", "hello"));
    let sink = Arc::new(RecordingSink::new());
    let env = CallEnvironment::new("conv").with_transcript(sink.clone());

    let found = registry
        .dispatch(
            &ToolCall::new("c1", "file_content_extractor", r#"{"file_url": "files/a.txt"}"#),
            &env,
        )
        .await;
    assert_eq!(found.content(), "hello");
    assert_eq!(
        sink.content(),
        "## Request arguments: \n**File URL**: files/a.txt\n\r## Response: \n```text\n\rhello\n\r```\n\r"
    );

    let missing = registry
        .dispatch(
            &ToolCall::new("c2", "file_content_extractor", r#"{"file_url": "files/none.txt"}"#),
            &env,
        )
        .await;
    assert_eq!(missing.content(), FILE_NOT_FOUND);
}

#[tokio::test]
async fn test_bad_arguments_become_failure_messages() {
    let registry = file_registry(MockExtractor::new());
    let env = CallEnvironment::new("conv");

    let result = registry
        .dispatch(&ToolCall::new("c1", "file_content_extractor", "{}"), &env)
        .await;
    assert!(matches!(result, ToolResult::Message { .. }));
    assert!(result.content().starts_with("Error: Invalid tool arguments"));
    assert_eq!(result.tool_call_id(), Some("c1"));

    let unknown = registry
        .dispatch(&ToolCall::new("c2", "no_such_tool", "{}"), &env)
        .await;
    assert_eq!(unknown.content(), "Error: Tool not found: no_such_tool");
    assert_eq!(unknown.tool_call_id(), Some("c2"));
}

#[tokio::test]
async fn test_image_filtering_and_rendering() {
    let png = Attachment::url("image/png", "files/out/a.png");
    let jpeg = Attachment::url("image/jpeg", "files/out/b.jpg");
    let gif = Attachment::url("image/gif", "files/out/c.gif");
    let client = Arc::new(MockDeploymentClient::new(vec![MockResponse::Deltas(vec![
        DeploymentDelta::attachment(png.clone()),
        DeploymentDelta::attachment(jpeg.clone()),
        DeploymentDelta::attachment(gif.clone()),
    ])]));

    let mut registry = ToolRegistry::new();
    registry.register(ImageGenerationTool::new(client.clone()));

    let transcript = Arc::new(RecordingSink::new());
    let answer = Arc::new(RecordingSink::new());
    let env = CallEnvironment::new("conv")
        .with_transcript(transcript.clone())
        .with_answer(answer.clone());

    let result = registry
        .dispatch(
            &ToolCall::new(
                "call_img",
                "image_generation_tool",
                r#"{"prompt": "three shapes", "size": "1792x1024", "quality": "hd"}"#,
            ),
            &env,
        )
        .await;

    assert_eq!(
        answer.content(),
        "\n\r![image](files/out/a.png)\n\r\n\r![image](files/out/b.jpg)\n\r"
    );
    assert_eq!(result.content(), IMAGE_SHOWN_MESSAGE);
    assert_eq!(result.attachments(), &[png.clone(), jpeg.clone(), gif.clone()]);
    assert_eq!(result.tool_call_id(), Some("call_img"));
    assert_eq!(transcript.attachments(), vec![png, jpeg, gif]);

    let sent = &client.requests()[0];
    assert_eq!(sent.deployment, "dall-e-3");
    let configuration = sent.configuration.as_ref().unwrap();
    assert_eq!(configuration["size"], "1792x1024");
    assert_eq!(configuration["quality"], "hd");
    assert!(!configuration.contains_key("prompt"));
}

#[tokio::test]
async fn test_configuration_passthrough_is_verbatim() {
    let client = Arc::new(MockDeploymentClient::with_text("done"));
    let proxy = DeploymentProxy::new(client.clone(), "report-writer");
    let tool = DeploymentTool::new("write_report", "Writes reports", proxy).unwrap();

    let extras = json!({
        "format": "pdf",
        "sections": ["intro", "findings"],
        "limits": {"pages": 4, "strict": true},
        "seed": null
    });
    let mut arguments = extras.clone();
    arguments["prompt"] = json!("write it");

    let ctx = ToolContext::new("conv", arguments.to_string()).with_credential("k-1");
    let result = tool.execute(&ctx).await.unwrap();
    assert_eq!(result.content(), "done");

    let sent = &client.requests()[0];
    assert_eq!(
        serde_json::Value::Object(sent.configuration.clone().unwrap()),
        extras
    );
    assert_eq!(sent.messages.last().unwrap().content, "write it");
    assert_eq!(sent.api_key.as_deref(), Some("k-1"));
}

/// Sends one delta, then stalls forever.
struct StallingClient;

#[async_trait]
impl DeploymentClient for StallingClient {
    async fn stream(&self, _request: DeploymentRequest) -> stagehand_llm::Result<DeltaStream> {
        let first = futures::stream::iter(vec![Ok(DeploymentDelta::text("first part"))]);
        Ok(Box::pin(first.chain(futures::stream::pending())))
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

#[tokio::test]
async fn test_cancellation_stops_stream() {
    let tool = Arc::new(
        DeploymentTool::new(
            "slow",
            "A slow deployment",
            DeploymentProxy::new(Arc::new(StallingClient), "slow"),
        )
        .unwrap(),
    );
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let ctx = ToolContext::new("conv", r#"{"prompt": "go"}"#)
        .with_transcript(sink.clone())
        .with_cancellation(token.clone());

    let handle = tokio::spawn({
        let tool = Arc::clone(&tool);
        async move { tool.execute(&ctx).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("tool did not stop after cancellation")
        .unwrap();
    assert!(matches!(outcome, Err(ToolError::Cancelled)));
    assert_eq!(sink.content(), "first part");
}

#[tokio::test]
async fn test_rejected_deployment_reports_failure() {
    let client = Arc::new(MockDeploymentClient::new(vec![MockResponse::Reject(
        "deployment unavailable".into(),
    )]));
    let mut registry = ToolRegistry::new();
    registry.register(
        DeploymentTool::new("ask", "Ask another model", DeploymentProxy::new(client, "other"))
            .unwrap(),
    );

    let sink = Arc::new(RecordingSink::new());
    let env = CallEnvironment::new("conv").with_transcript(sink.clone());
    let result = registry
        .dispatch(&ToolCall::new("c9", "ask", r#"{"prompt": "hi"}"#), &env)
        .await;

    assert!(result.content().starts_with("Error: LLM error"));
    assert!(result.content().contains("deployment unavailable"));
    assert!(sink.is_empty());
}

#[test]
fn test_definitions_list_every_tool() {
    let client = Arc::new(MockDeploymentClient::new(vec![]));
    let mut registry = ToolRegistry::new();
    registry.register(FileContentExtractionTool::new(Arc::new(MockExtractor::new())));
    registry.register(ImageGenerationTool::new(client));

    let definitions = registry.definitions();
    assert_eq!(definitions.len(), 2);
    assert_eq!(definitions[0]["function"]["name"], "file_content_extractor");
    assert_eq!(definitions[1]["function"]["name"], "image_generation_tool");
    assert!(definitions.iter().all(|d| d["type"] == "function"));
}
