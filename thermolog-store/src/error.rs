//! Store error types.

use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration failed.
    #[error("Migration to schema version {version} failed: {reason}")]
    Migration {
        /// Target schema version.
        version: i64,
        /// Underlying failure.
        reason: String,
    },

    /// Keychain error.
    #[error("Keychain error: {0}")]
    Keychain(#[from] thermolog_fetch::KeychainError),

    /// A reading that must never be stored.
    #[error("Invalid reading: {0}")]
    InvalidReading(#[from] thermolog_core::CoreError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_) | StoreError::Database(_) | StoreError::Keychain(_)
        )
    }
}
