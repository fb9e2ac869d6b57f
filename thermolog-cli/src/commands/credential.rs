//! Credential command - inspect or clear the stored credential.

use anyhow::Result;
use clap::{Args, Subcommand};
use thermolog_agent::open_credential_store;
use thermolog_store::CredentialStore;
use tracing::info;

use super::load_config;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the credential command.
#[derive(Args)]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub action: CredentialAction,
}

/// Credential subcommands.
#[derive(Subcommand)]
pub enum CredentialAction {
    /// Show the stored credential with the token masked.
    Show,

    /// Remove the stored credential.
    Clear,
}

/// Runs the credential command.
pub async fn run(args: &CredentialArgs, cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;
    let store = open_credential_store(&config);

    match args.action {
        CredentialAction::Show => {
            let credential = store.current().await?;
            match cli.format {
                OutputFormat::Text => {
                    println!("{}", TextFormatter::new(!cli.no_color).format_credential(credential.as_ref()));
                }
                OutputFormat::Json => {
                    println!("{}", JsonFormatter::new(cli.pretty).format_credential(credential.as_ref())?);
                }
            }
        }
        CredentialAction::Clear => {
            store.clear().await?;
            info!(store = store.name(), "Credential cleared");
            println!("Credential cleared");
        }
    }

    Ok(())
}
