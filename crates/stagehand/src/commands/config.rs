//! Config command - show the merged configuration.

use anyhow::Result;
use clap::Args;
use console::Style;
use stagehand_config::StagehandConfig;

use super::Context;

const REDACTED: &str = "********";

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print only the explicitly configured sections, without defaults
    #[arg(long)]
    pub raw: bool,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let bold = Style::new().bold();
    let green = Style::new().green();
    let dim = Style::new().dim();

    println!("# Stagehand Configuration\n");

    println!("{}", bold.apply_to("Sources (lowest precedence first):"));
    for source in &loaded.sources {
        let status = if source.loaded {
            green.apply_to("loaded").to_string()
        } else {
            dim.apply_to("not found").to_string()
        };
        println!("  {} [{}]", source.path.display(), status);
    }
    if loaded.loaded_from().is_empty() {
        println!("  {}", dim.apply_to("No config files loaded (using defaults)"));
    }
    println!();

    let config = if args.raw {
        loaded.config.clone()
    } else {
        effective(&loaded.config)
    };
    println!("{}", redact(config).to_toml()?);
    Ok(())
}

/// Fill every unset section with its defaults.
fn effective(config: &StagehandConfig) -> StagehandConfig {
    StagehandConfig {
        dial: Some(config.dial.clone().unwrap_or_default()),
        rag: Some(config.rag.clone().unwrap_or_default()),
        image: Some(config.image.clone().unwrap_or_default()),
        files: Some(config.files.clone().unwrap_or_default()),
        cache: Some(config.cache.clone().unwrap_or_default()),
        embedding: Some(config.embedding.clone().unwrap_or_default()),
        mcp: Some(config.mcp.clone().unwrap_or_default()),
        deployments: config.deployments.clone(),
    }
}

/// Hide credentials before printing.
fn redact(mut config: StagehandConfig) -> StagehandConfig {
    if let Some(dial) = config.dial.as_mut()
        && dial.api_key.is_some()
    {
        dial.api_key = Some(REDACTED.to_string());
    }
    if let Some(openai) = config.embedding.as_mut().and_then(|e| e.openai.as_mut())
        && openai.api_key.is_some()
    {
        openai.api_key = Some(REDACTED.to_string());
    }
    if let Some(mcp) = config.mcp.as_mut() {
        for server in &mut mcp.servers {
            for [_, value] in &mut server.headers {
                *value = REDACTED.to_string();
            }
        }
    }
    config
}
