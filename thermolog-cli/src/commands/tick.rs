//! Tick command - one poll cycle with the stored credential.

use anyhow::Result;
use thermolog_agent::Agent;
use tracing::info;

use super::load_config;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the tick command.
pub async fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli).await?;
    let agent = Agent::from_config(&config).await?;

    let outcome = agent.poll_once().await;
    info!(outcome = outcome.label(), "Tick finished");

    match cli.format {
        OutputFormat::Text => println!("{}", TextFormatter::new(!cli.no_color).format_tick(&outcome)),
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format_tick(&outcome)?),
    }

    Ok(ExitCode::from(&outcome))
}
