//! CLI command implementations.

pub mod config;
pub mod credential;
pub mod ingest;
pub mod readings;
pub mod run;
pub mod tick;

use anyhow::{Context, Result};
use std::path::PathBuf;
use thermolog_store::{default_config_path, Config};

use crate::Cli;

/// Config file path from `--config` or the platform default.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(default_config_path)
}

/// Loads the config file, falling back to defaults if it does not exist.
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let path = config_path(cli);
    Config::load(&path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))
}
