//! CLI command handlers.

pub mod call;
pub mod config;
pub mod tools;

use std::path::PathBuf;

use anyhow::Result;
use console::Style;
use stagehand_config::{DialSection, LoadedConfig, RagSection};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Verbose output enabled.
    pub verbose: bool,
    /// Directory searched for `stagehand.toml`.
    pub project_dir: Option<PathBuf>,
    /// DIAL endpoint from the command line or `DIAL_ENDPOINT`.
    pub dial_endpoint: Option<String>,
    /// Retrieval deployment from the command line or `DEPLOYMENT_NAME`.
    pub deployment: Option<String>,
}

impl Context {
    /// Load the layered config files and apply command-line overrides.
    ///
    /// Loading warnings are printed to stderr.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let mut loaded = stagehand_config::load_config(self.project_dir.as_deref())?;

        if let Some(endpoint) = &self.dial_endpoint {
            loaded
                .config
                .dial
                .get_or_insert_with(DialSection::default)
                .endpoint = endpoint.clone();
        }
        if let Some(deployment) = &self.deployment {
            loaded
                .config
                .rag
                .get_or_insert_with(RagSection::default)
                .deployment = deployment.clone();
        }

        let yellow = Style::new().yellow();
        for warning in &loaded.warnings {
            eprintln!("{} {}", yellow.apply_to("warning:"), warning);
        }

        Ok(loaded)
    }
}
