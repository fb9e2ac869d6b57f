//! Reading history storage.
//!
//! A merge inserts a reading unless its timestamp is already held, then
//! trims everything outside the retention window. Both steps happen as one
//! atomic unit: a concurrent reader sees the history before the merge or
//! after it, never in between.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thermolog_core::Reading;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::history::ReadingHistory;

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Default retention window.
pub fn default_retention() -> Duration {
    Duration::days(DEFAULT_RETENTION_DAYS)
}

/// What a merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// The reading was new and is now stored.
    pub inserted: bool,
    /// Readings dropped by the retention trim.
    pub trimmed: usize,
}

// ============================================================================
// Reading Store Trait
// ============================================================================

/// Durable, deduplicated, retention-bounded reading history.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Merges a reading, trimming relative to `now`.
    async fn merge_at(&self, reading: &Reading, now: DateTime<Utc>) -> Result<MergeOutcome, StoreError>;

    /// Merges a reading, trimming relative to the current time.
    async fn merge(&self, reading: &Reading) -> Result<MergeOutcome, StoreError> {
        self.merge_at(reading, Utc::now()).await
    }

    /// All readings, oldest first.
    async fn list(&self) -> Result<Vec<Reading>, StoreError>;

    /// Readings at or after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, StoreError>;

    /// The most recent reading.
    async fn latest(&self) -> Result<Option<Reading>, StoreError>;

    /// Number of stored readings.
    async fn len(&self) -> Result<usize, StoreError>;
}

// ============================================================================
// Memory Store
// ============================================================================

/// Non-durable store over a [`ReadingHistory`].
#[derive(Debug)]
pub struct MemoryReadingStore {
    history: RwLock<ReadingHistory>,
    retention: Duration,
}

impl MemoryReadingStore {
    /// Creates an empty store with the given retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            history: RwLock::new(ReadingHistory::new()),
            retention,
        }
    }
}

impl Default for MemoryReadingStore {
    fn default() -> Self {
        Self::new(default_retention())
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn merge_at(&self, reading: &Reading, now: DateTime<Utc>) -> Result<MergeOutcome, StoreError> {
        reading.validate()?;

        let mut history = self.history.write().await;
        let added = history.insert(reading.clone());
        let trimmed = history.trim(self.retention, now);
        let inserted = added && history.contains(reading.timestamp);

        debug!(inserted, trimmed, total = history.len(), "Merged reading");
        Ok(MergeOutcome { inserted, trimmed })
    }

    async fn list(&self) -> Result<Vec<Reading>, StoreError> {
        Ok(self.history.read().await.iter().cloned().collect())
    }

    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, StoreError> {
        Ok(self.history.read().await.since(since).cloned().collect())
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        Ok(self.history.read().await.latest().cloned())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.history.read().await.len())
    }
}
