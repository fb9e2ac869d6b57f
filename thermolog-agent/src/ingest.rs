//! Snapshot ingestion: parse, merge, forward.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thermolog_core::ReadingSink;
use thermolog_fetch::{BucketParser, RawSnapshot};
use thermolog_store::ReadingStore;
use tracing::{debug, info, instrument, warn};

use crate::error::AgentError;

/// What happened to one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new reading was stored.
    Stored {
        /// Reading timestamp in epoch milliseconds.
        timestamp_ms: i64,
        /// Sensors in the reading.
        sensors: usize,
        /// Thermostats in the reading.
        thermostats: usize,
    },
    /// A reading with the same timestamp already existed, or it fell
    /// outside the retention window.
    Duplicate,
    /// The snapshot held no sensors or thermostats.
    Discarded(String),
}

impl IngestOutcome {
    /// True if a new reading landed in the store.
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// Turns raw snapshots into stored readings.
pub struct Ingestor {
    parser: BucketParser,
    readings: Arc<dyn ReadingStore>,
    sink: Option<Arc<dyn ReadingSink>>,
}

impl Ingestor {
    /// Creates an ingestor without a sink.
    pub fn new(readings: Arc<dyn ReadingStore>) -> Self {
        Self {
            parser: BucketParser::new(),
            readings,
            sink: None,
        }
    }

    /// Forwards every newly stored reading to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReadingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The reading store this ingestor merges into.
    pub fn readings(&self) -> &Arc<dyn ReadingStore> {
        &self.readings
    }

    /// Parses `snapshot` as captured at `captured_at` and merges it.
    ///
    /// Parse failures are logged and reported as [`IngestOutcome::Discarded`].
    /// Sink failures are logged and do not affect the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reading store fails.
    #[instrument(skip(self, snapshot), fields(buckets = snapshot.len()))]
    pub async fn ingest(
        &self,
        snapshot: &RawSnapshot,
        captured_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, AgentError> {
        let reading = match self.parser.parse(snapshot, captured_at) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "Discarding snapshot");
                return Ok(IngestOutcome::Discarded(e.to_string()));
            }
        };

        let merge = self.readings.merge(&reading).await?;
        if !merge.inserted {
            debug!(timestamp = %reading.timestamp, "Reading already stored");
            return Ok(IngestOutcome::Duplicate);
        }

        info!(
            timestamp = %reading.timestamp,
            sensors = reading.sensors.len(),
            thermostats = reading.thermostats.len(),
            trimmed = merge.trimmed,
            "Stored reading"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.emit(&reading).await {
                warn!(sink = sink.name(), error = %e, "Reading sink failed");
            }
        }

        Ok(IngestOutcome::Stored {
            timestamp_ms: reading.timestamp_millis(),
            sensors: reading.sensors.len(),
            thermostats: reading.thermostats.len(),
        })
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("readings", &self.readings.name())
            .field("sink", &self.sink.as_ref().map(|s| s.name()))
            .finish_non_exhaustive()
    }
}
