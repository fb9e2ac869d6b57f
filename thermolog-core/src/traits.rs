//! Trait definitions for thermolog.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::Reading;

/// Downstream consumer of newly stored readings.
///
/// Implementors forward readings to whatever persists or serves them
/// (an ingestion service, a message queue, a test probe). A sink failure
/// never rolls back the local store.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Hands one reading to the sink.
    async fn emit(&self, reading: &Reading) -> Result<(), CoreError>;
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ReadingSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn emit(&self, _reading: &Reading) -> Result<(), CoreError> {
        Ok(())
    }
}
