//! Tools command - list the registered tools.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::Context;
use crate::setup;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Print the function-calling definitions as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let runtime = setup::build_runtime(&loaded.config, ctx.verbose).await?;

    if args.json {
        let definitions = runtime.registry.definitions();
        println!("{}", serde_json::to_string_pretty(&definitions)?);
    } else {
        let bold = Style::new().bold();
        let dim = Style::new().dim();
        for name in runtime.registry.names() {
            let Some(tool) = runtime.registry.get(name) else {
                continue;
            };
            let summary = tool.description().lines().next().unwrap_or_default();
            let stage = if tool.show_in_stage() { "" } else { " (no stage)" };
            println!("{}{}", bold.apply_to(name), dim.apply_to(stage));
            println!("  {}", dim.apply_to(summary));
        }
    }

    runtime.shutdown().await;
    Ok(())
}
