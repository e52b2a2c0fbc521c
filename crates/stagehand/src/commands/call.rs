//! Call command - execute one tool call.
//!
//! The transcript streams to stderr as the tool runs; the final answer and
//! the tool result go to stdout.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::Style;
use stagehand_llm::Attachment;
use stagehand_tools::{CallEnvironment, RecordingSink, ToolCall, ToolResult, TranscriptSink};
use tokio_util::sync::CancellationToken;

use super::Context;
use crate::setup;

/// Arguments for the call command.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Name of the tool to call
    #[arg(required = true)]
    pub tool: String,

    /// Tool arguments as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub args: String,

    /// Conversation the call belongs to (default: a fresh one)
    #[arg(short, long)]
    pub conversation: Option<String>,

    /// Credential forwarded to the file store and deployments
    #[arg(long, env = "DIAL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Writes the transcript to stderr as it arrives.
struct StderrTranscript;

impl TranscriptSink for StderrTranscript {
    fn append_content(&self, content: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(content.as_bytes());
        let _ = stderr.flush();
    }

    fn add_attachment(&self, attachment: &Attachment) {
        let dim = Style::new().dim();
        let label = attachment
            .title
            .as_deref()
            .or(attachment.url.as_deref())
            .unwrap_or("inline data");
        let kind = attachment.content_type.as_deref().unwrap_or("unknown");
        eprintln!("{}", dim.apply_to(format!("[attachment: {label} ({kind})]")));
    }
}

/// Run the call command.
pub async fn run(args: CallArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let runtime = setup::build_runtime(&loaded.config, ctx.verbose).await?;

    if !runtime.registry.contains(&args.tool) {
        let names = runtime.registry.names().join(", ");
        runtime.shutdown().await;
        anyhow::bail!("unknown tool '{}'. Available: {}", args.tool, names);
    }

    let conversation = args
        .conversation
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let call_id = format!("call_{}", uuid::Uuid::new_v4().simple());
    let dim = Style::new().dim();
    if ctx.verbose {
        eprintln!("{}", dim.apply_to(format!("Conversation: {conversation}")));
        eprintln!("{}", dim.apply_to(format!("Call: {call_id}")));
    }

    let answer = Arc::new(RecordingSink::new());
    let cancel = CancellationToken::new();
    let mut env = CallEnvironment::new(&conversation)
        .with_transcript(Arc::new(StderrTranscript))
        .with_answer(answer.clone())
        .with_cancellation(cancel.clone());
    if let Some(api_key) = &args.api_key {
        env = env.with_credential(api_key);
    }

    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let call = ToolCall::new(call_id, &args.tool, args.args);
    let result = runtime.registry.dispatch(&call, &env).await;
    interrupt.abort();
    eprintln!();

    let answer = answer.content();
    if !answer.is_empty() {
        println!("{answer}");
    }
    print_result(&result, args.json)?;

    runtime.shutdown().await;
    Ok(())
}

fn print_result(result: &ToolResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", result.content());
    let dim = Style::new().dim();
    for attachment in result.attachments() {
        let target = attachment.url.as_deref().unwrap_or("inline data");
        println!("{}", dim.apply_to(format!("attachment: {target}")));
    }
    Ok(())
}
