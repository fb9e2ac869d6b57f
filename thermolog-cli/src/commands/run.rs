//! Run command - the long-running agent.

use anyhow::{Context, Result};
use thermolog_agent::{Agent, CredentialEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use super::load_config;
use crate::Cli;

/// Runs the agent until Ctrl+C.
///
/// Credential events are read from stdin, one JSON object per line. The
/// agent keeps polling after stdin closes.
pub async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;
    let agent = Agent::from_config(&config).await.context("failed to start agent")?;

    info!(interval_secs = config.poll.interval_secs, "Starting agent");
    if agent.start().await?.is_some() {
        info!("Resumed from stored credential");
    } else {
        info!("Waiting for a credential event on stdin");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_line(&agent, &line).await,
                Ok(None) => {
                    debug!("stdin closed, polling continues");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin, no longer accepting events");
                    stdin_open = false;
                }
            },
            result = &mut shutdown => {
                result.context("failed to listen for Ctrl+C")?;
                info!("Shutting down");
                break;
            }
        }
    }

    agent.shutdown().await;
    Ok(())
}

async fn handle_line(agent: &Agent, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let event = match CredentialEvent::from_json(line) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Skipping malformed event");
            return;
        }
    };

    match agent.handle_event(event).await {
        Ok(outcome) => debug!(
            snapshot = outcome.snapshot.is_some(),
            credential_updated = outcome.credential_updated(),
            "Handled event"
        ),
        Err(e) => error!(error = %e, "Failed to apply credential event"),
    }
}
