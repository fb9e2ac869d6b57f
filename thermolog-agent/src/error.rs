//! Agent error types.

use thiserror::Error;

/// Errors surfaced by the agent.
///
/// Poll failures are not errors: they are reported as
/// [`crate::TickOutcome`] values and never stop the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Store(#[from] thermolog_store::StoreError),

    /// Client or hook setup failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] thermolog_fetch::FetchError),

    /// A credential event could not be decoded.
    #[error("Invalid credential event: {0}")]
    InvalidEvent(String),
}

impl AgentError {
    /// Returns true if retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Fetch(_) | Self::InvalidEvent(_) => false,
        }
    }
}
