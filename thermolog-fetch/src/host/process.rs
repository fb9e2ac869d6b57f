//! Subprocess execution for external hooks.
//!
//! Hooks are fire-and-report: the agent only cares whether the command
//! exited cleanly in time. Stdout is discarded and stderr is kept short
//! enough to log.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

/// Longest stderr excerpt carried in an error.
const STDERR_EXCERPT_CHARS: usize = 512;

/// How a finished hook exited.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code, or -1 if the child was killed by a signal.
    pub exit_code: i32,
    /// Last part of stderr, trimmed.
    pub stderr: String,
    /// Wall-clock run time.
    pub duration: Duration,
}

impl ProcessOutput {
    /// Returns true for exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turns a non-zero exit into [`ProcessError::NonZeroExit`].
    pub fn into_result(self) -> Result<Self, ProcessError> {
        if self.success() {
            return Ok(self);
        }
        Err(ProcessError::NonZeroExit {
            code: self.exit_code,
            stderr: self.stderr,
        })
    }
}

/// Runs hook commands with a bounded wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a runner.
    pub fn new() -> Self {
        Self
    }

    /// Resolves `program` against `PATH`. Paths containing a separator
    /// are taken as given.
    pub fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    /// Runs `program` with `args`, killing it if `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::NotFound`] if the program cannot be resolved,
    /// [`ProcessError::Timeout`] if it overruns, or [`ProcessError::Io`] if
    /// it cannot be spawned. A non-zero exit is not an error here; see
    /// [`ProcessOutput::into_result`].
    #[instrument(skip(self, args), fields(program = %program, timeout = ?timeout))]
    pub async fn run_with_timeout(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let Some(path) = self.resolve(program) else {
            warn!("Hook program not found");
            return Err(ProcessError::NotFound(program.to_string()));
        };
        debug!(path = %path.display(), argc = args.len(), "Spawning hook");

        let started = Instant::now();
        let child = Command::new(&path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let Ok(output) = tokio::time::timeout(timeout, child).await else {
            warn!("Hook timed out, killed");
            return Err(ProcessError::Timeout(timeout));
        };
        let output = output?;

        let result = ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stderr: stderr_excerpt(&output.stderr),
            duration: started.elapsed(),
        };
        debug!(exit_code = result.exit_code, duration = ?result.duration, "Hook exited");
        Ok(result)
    }
}

/// Keeps the tail of stderr, where the actual error usually is.
fn stderr_excerpt(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_EXCERPT_CHARS {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - STDERR_EXCERPT_CHARS).collect();
    format!("...{tail}")
}
