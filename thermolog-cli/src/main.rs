// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! thermolog CLI - vendor thermostat polling agent.
//!
//! # Examples
//!
//! ```bash
//! # Long-running agent fed credential events on stdin
//! credential-source | thermolog run
//!
//! # One poll with the stored credential (cron / host alarm)
//! thermolog tick
//!
//! # Apply a captured event
//! thermolog ingest event.json
//!
//! # Last day of readings as JSON
//! thermolog readings --since 2025-03-01T00:00:00Z --format json --pretty
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thermolog_agent::TickOutcome;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{config, credential, ingest, readings, run, tick};

// ============================================================================
// CLI Definition
// ============================================================================

/// thermolog CLI - vendor thermostat polling agent.
#[derive(Parser)]
#[command(name = "thermolog")]
#[command(about = "Polls a thermostat vendor with a captured session and keeps a reading history")]
#[command(long_about = r#"
thermolog keeps a durable history of thermostat and remote-sensor readings.

A credential source (for example a browser extension watching a live
vendor session) feeds session tokens as JSON lines:

  {"token": "...", "accountId": "...", "snapshot": {"updated_buckets": [...]}}

Each new token arms a periodic poll. When the vendor rejects the token the
agent clears it, stops polling, and runs the configured refresh command.

Examples:
  thermolog run                  # Long-running agent
  thermolog tick                 # One poll (host alarm mode)
  thermolog readings --limit 5   # Latest readings
  thermolog credential show      # Masked stored credential
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to the platform config directory).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (no logging).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the agent, reading credential events from stdin.
    Run,

    /// Poll once with the stored credential.
    #[command(visible_alias = "t")]
    Tick,

    /// Apply one credential event from a file or stdin.
    Ingest(ingest::IngestArgs),

    /// List stored readings.
    #[command(visible_alias = "r")]
    Readings(readings::ReadingsArgs),

    /// Inspect or clear the stored credential.
    Credential(credential::CredentialArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No credential is stored.
    NoCredential = 2,
    /// The vendor rejected the credential.
    AuthExpired = 3,
    /// The poll failed and should be retried on the next tick.
    PollFailed = 4,
}

impl From<&TickOutcome> for ExitCode {
    fn from(outcome: &TickOutcome) -> Self {
        match outcome {
            TickOutcome::Stored
            | TickOutcome::Duplicate
            | TickOutcome::Discarded(_)
            | TickOutcome::Coalesced => Self::Success,
            TickOutcome::NoCredential | TickOutcome::NotArmed => Self::NoCredential,
            TickOutcome::AuthExpired | TickOutcome::StaleAuthExpiry => Self::AuthExpired,
            TickOutcome::TransientFailure(_) | TickOutcome::StorageFailure(_) => Self::PollFailed,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("thermolog=debug,info")
        } else {
            EnvFilter::new("thermolog=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Run => run::run(&cli).await.map(|()| ExitCode::Success),
        Commands::Tick => tick::run(&cli).await,
        Commands::Ingest(args) => ingest::run(args, &cli).await,
        Commands::Readings(args) => readings::run(args, &cli).await.map(|()| ExitCode::Success),
        Commands::Credential(args) => credential::run(args, &cli).await.map(|()| ExitCode::Success),
        Commands::Config(args) => config::run(args, &cli).await.map(|()| ExitCode::Success),
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["thermolog", "readings", "--limit", "3", "-f", "json", "--pretty"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.pretty);
        assert!(matches!(cli.command, Commands::Readings(ref args) if args.limit == Some(3)));
    }

    #[test]
    fn test_tick_exit_codes() {
        assert_eq!(ExitCode::from(&TickOutcome::Stored), ExitCode::Success);
        assert_eq!(ExitCode::from(&TickOutcome::NoCredential), ExitCode::NoCredential);
        assert_eq!(ExitCode::from(&TickOutcome::AuthExpired), ExitCode::AuthExpired);
        assert_eq!(
            ExitCode::from(&TickOutcome::TransientFailure("timeout".to_string())),
            ExitCode::PollFailed
        );
    }
}
