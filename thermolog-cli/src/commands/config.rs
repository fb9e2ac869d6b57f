//! Config command - manage configuration.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use thermolog_store::{default_config_dir, default_data_dir, Config};
use tracing::info;

use super::{config_path, load_config};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Show configuration and data paths.
    Path,

    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Init { force } => init_config(*force, cli).await,
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;

    match cli.format {
        OutputFormat::Text => {
            println!("thermolog Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Poll interval:   {}s", config.poll.interval_secs);
            println!("Poll timeout:    {}s", config.poll.timeout_secs);
            println!("Vendor:          {}", config.vendor.base_url);
            println!("Auth scheme:     {}", config.vendor.auth_scheme);
            println!("Allowed domains: {}", config.vendor.allowed_domains.join(", "));
            println!("Retention:       {} days", config.storage.retention_days);
            match config.database_path() {
                Some(path) => println!("Readings:        sqlite {}", path.display()),
                None => println!("Readings:        memory"),
            }
            match config.credential_path() {
                Some(path) => println!("Credential:      file {}", path.display()),
                None => println!("Credential:      {:?}", config.storage.credentials),
            }
            match &config.recovery.command {
                Some(argv) => println!("Refresh command: {}", argv.join(" ")),
                None => println!("Refresh command: none"),
            }
            println!("Sink:            {}", config.sink.url.as_deref().unwrap_or("none"));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let data_dir = default_data_dir();
    let config_file = config_path(cli);

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:  {}", config_dir.display());
            println!("Config file: {}", config_file.display());
            println!("Data dir:    {}", data_dir.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_file.display().to_string(),
                "data_dir": data_dir.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(force: bool, cli: &Cli) -> Result<()> {
    let path = config_path(cli);

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save(&path).await?;
    info!(path = %path.display(), "Config written");
    println!("Wrote {}", path.display());

    Ok(())
}
