//! Configuration system for Stagehand.
//!
//! Provides TOML-based configuration with:
//! - One section per subsystem (`[dial]`, `[rag]`, `[cache]`, `[embedding]`, ...)
//! - Config file layering (XDG user config + project-local overrides)
//! - Section-by-section merging, so a project file only has to name what it changes
//!
//! CLI flags and environment variables are applied on top by the binary.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
