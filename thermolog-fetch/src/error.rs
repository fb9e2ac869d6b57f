//! Fetch error types.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations that are not poll outcomes.
///
/// Vendor responses are classified into [`crate::PollOutcome`] rather than
/// surfaced as errors; this type covers setup and side channels.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP layer failure.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Process error.
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid header value.
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// Client construction failed.
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl HttpError {
    /// Returns true if a later attempt could succeed without changes.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::DomainNotAllowed(_) | Self::InvalidUrl(_) | Self::InvalidHeader(_) | Self::Build(_) => {
                false
            }
        }
    }
}

// ============================================================================
// Parse Error
// ============================================================================

/// Error type for snapshot parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The snapshot decoded but held no sensors or thermostats.
    #[error("Snapshot contained no sensors or thermostats ({buckets} buckets)")]
    NoDevices {
        /// Number of buckets in the snapshot.
        buckets: usize,
    },

    /// The snapshot document did not have the expected structure.
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            _ => KeychainError::Other(err.to_string()),
        }
    }
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Command timed out.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit code.
    #[error("Command exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Exit code from the process.
        code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
