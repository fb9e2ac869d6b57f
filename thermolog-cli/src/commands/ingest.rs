//! Ingest command - apply one credential event.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use thermolog_agent::{Agent, CredentialEvent, IngestOutcome, TickOutcome};
use thermolog_store::CredentialStore;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::load_config;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Event file; reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,
}

/// What applying the event did.
#[derive(Debug)]
pub struct IngestReport {
    /// Outcome of the event's snapshot, if it carried one.
    pub snapshot: Option<IngestOutcome>,
    /// Whether the stored credential was replaced.
    pub credential_updated: bool,
    /// Outcome of the follow-up poll, if one ran.
    pub poll: Option<TickOutcome>,
}

/// Runs the ingest command.
pub async fn run(args: &IngestArgs, cli: &Cli) -> Result<ExitCode> {
    let text = read_event(args.file.as_ref()).await?;
    let event = CredentialEvent::from_json(text.trim()).context("invalid credential event")?;
    debug!(?event, "Read credential event");

    let config = load_config(cli).await?;
    let agent = Agent::from_config(&config).await?;
    let report = apply(&agent, event).await?;

    match cli.format {
        OutputFormat::Text => println!("{}", TextFormatter::new(!cli.no_color).format_ingest(&report)),
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format_ingest(&report)?),
    }

    Ok(report.poll.as_ref().map_or(ExitCode::Success, ExitCode::from))
}

/// Applies `event`, then polls once if a credential is stored.
pub async fn apply(agent: &Agent, event: CredentialEvent) -> Result<IngestReport> {
    let outcome = agent.handle_event(event).await?;
    let credential_updated = outcome.credential_updated();

    let poll = match outcome.poll {
        Some(pending) => Some(pending.await.context("poll task failed")?),
        None if agent.credentials().current().await?.is_some() => Some(agent.poll_once().await),
        None => None,
    };
    agent.shutdown().await;

    Ok(IngestReport {
        snapshot: outcome.snapshot,
        credential_updated,
        poll,
    })
}

async fn read_event(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}
