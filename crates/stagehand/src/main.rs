//! Stagehand - tool execution and document retrieval for DIAL deployments
//!
//! Main entry point for the Stagehand CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod setup;

use commands::{call, config, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Stagehand - tool execution and document retrieval for DIAL deployments
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the project-local stagehand.toml
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// DIAL core URL (overrides [dial] endpoint)
    #[arg(long, global = true, env = "DIAL_ENDPOINT")]
    pub dial_endpoint: Option<String>,

    /// Deployment answering retrieval questions (overrides [rag] deployment)
    #[arg(long, global = true, env = "DEPLOYMENT_NAME")]
    pub deployment: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the tools the model can call
    Tools(tools::ToolsArgs),

    /// Execute one tool call
    Call(call::CallArgs),

    /// Show the merged configuration and its sources
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "stagehand=debug,stagehand_tools=debug,stagehand_llm=debug,stagehand_mcp=debug,stagehand_cache=debug,stagehand_config=debug,info"
    } else {
        "stagehand=info,stagehand_tools=info,stagehand_llm=info,stagehand_mcp=info,stagehand_cache=info,warn"
    };

    let log_dir = stagehand_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "stagehand.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "stagehand=trace,stagehand_tools=trace,stagehand_llm=trace,stagehand_mcp=trace,stagehand_cache=trace,stagehand_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        verbose: cli.verbose,
        project_dir: cli.project_dir,
        dial_endpoint: cli.dial_endpoint,
        deployment: cli.deployment,
    };

    match cli.command {
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Call(args) => call::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
