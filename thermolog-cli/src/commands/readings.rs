//! Readings command - list stored readings.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use thermolog_agent::open_reading_store;
use thermolog_store::ReadingStore;

use super::load_config;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the readings command.
#[derive(Args, Default)]
pub struct ReadingsArgs {
    /// Show only the newest N readings.
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show readings at or after this time (RFC 3339).
    #[arg(long, short)]
    pub since: Option<DateTime<Utc>>,
}

/// Runs the readings command.
pub async fn run(args: &ReadingsArgs, cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;
    let store = open_reading_store(&config).await?;

    let mut readings = match args.since {
        Some(since) => store.list_since(since).await?,
        None => store.list().await?,
    };
    if let Some(limit) = args.limit {
        let skip = readings.len().saturating_sub(limit);
        readings.drain(..skip);
    }

    match cli.format {
        OutputFormat::Text => println!("{}", TextFormatter::new(!cli.no_color).format_readings(&readings)),
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format_readings(&readings)?),
    }

    Ok(())
}
