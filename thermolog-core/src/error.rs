//! Core error types for thermolog.

use thiserror::Error;

/// Core error type for thermolog operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A credential was missing its token or account id.
    #[error("Incomplete credential: {0}")]
    IncompleteCredential(&'static str),

    /// A reading carried no sensors and no thermostats.
    #[error("Reading has no sensors or thermostats")]
    EmptyReading,

    /// Invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A downstream sink rejected a reading.
    #[error("Sink error: {0}")]
    Sink(String),
}
