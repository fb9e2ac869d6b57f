//! Session-refresh hooks.
//!
//! After the vendor rejects a token, the agent asks the outside world to
//! refresh the live session so the credential source can capture a new
//! one. What "refresh" means is host-specific: reloading a browser tab,
//! poking a companion process, or nothing at all.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::FetchError;
use crate::host::ProcessRunner;

/// Default bound on a refresh command.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Best-effort request that a live vendor session be refreshed.
#[async_trait]
pub trait SessionRefreshHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Requests a refresh. Callers log failures and do not retry.
    async fn request_refresh(&self) -> Result<(), FetchError>;
}

// ============================================================================
// Noop Hook
// ============================================================================

/// Hook for hosts with no refreshable session.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRefreshHook;

#[async_trait]
impl SessionRefreshHook for NoopRefreshHook {
    fn name(&self) -> &str {
        "noop"
    }

    async fn request_refresh(&self) -> Result<(), FetchError> {
        debug!("No session refresh hook configured");
        Ok(())
    }
}

// ============================================================================
// Command Hook
// ============================================================================

/// Runs an external command to refresh the session.
#[derive(Debug, Clone)]
pub struct CommandRefreshHook {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    runner: ProcessRunner,
}

impl CommandRefreshHook {
    /// Creates a hook from an argv vector.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConfig`] for an empty argv.
    pub fn from_argv(argv: &[String], timeout: Duration) -> Result<Self, FetchError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| FetchError::InvalidConfig("recovery command is empty".to_string()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            runner: ProcessRunner::new(),
        })
    }

    /// The program that will be run.
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl SessionRefreshHook for CommandRefreshHook {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(skip(self), fields(program = %self.program))]
    async fn request_refresh(&self) -> Result<(), FetchError> {
        let output = self
            .runner
            .run_with_timeout(&self.program, &self.args, self.timeout)
            .await?
            .into_result()?;

        info!(duration = ?output.duration, "Session refresh requested");
        Ok(())
    }
}
