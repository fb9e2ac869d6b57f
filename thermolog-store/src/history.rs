//! In-memory reading history.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use thermolog_core::Reading;

/// First millisecond key that is still inside the retention window.
///
/// Rounds up, so every kept reading satisfies `now - timestamp <= window`
/// exactly.
pub fn retention_cutoff_millis(window: Duration, now: DateTime<Utc>) -> i64 {
    let cutoff = now - window;
    let millis = cutoff.timestamp_millis();
    if cutoff.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    }
}

/// Timestamp-keyed, ascending history of readings.
///
/// Keys are Unix milliseconds, so two readings captured within the same
/// millisecond are the same reading.
#[derive(Debug, Clone, Default)]
pub struct ReadingHistory {
    entries: BTreeMap<i64, Reading>,
}

impl ReadingHistory {
    /// Creates a new empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a reading unless one with the same timestamp exists.
    ///
    /// Returns true if the reading was added.
    pub fn insert(&mut self, reading: Reading) -> bool {
        let key = reading.timestamp_millis();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, reading);
        true
    }

    /// Drops every reading older than `now - window`.
    ///
    /// Returns the number of readings removed.
    pub fn trim(&mut self, window: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = retention_cutoff_millis(window, now);
        let kept = self.entries.split_off(&cutoff);
        let removed = self.entries.len();
        self.entries = kept;
        removed
    }

    /// Returns true if a reading with this timestamp is held.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.entries.contains_key(&timestamp.timestamp_millis())
    }

    /// All readings, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.entries.values()
    }

    /// Readings at or after `since`, oldest first.
    pub fn since(&self, since: DateTime<Utc>) -> impl Iterator<Item = &Reading> {
        self.entries.range(since.timestamp_millis()..).map(|(_, r)| r)
    }

    /// The most recent reading.
    pub fn latest(&self) -> Option<&Reading> {
        self.entries.values().next_back()
    }

    /// Number of readings held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no readings are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears all history.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermolog_core::{HvacAction, Thermostat};

    fn reading_at(ts: DateTime<Utc>) -> Reading {
        Reading::new(
            ts,
            vec![],
            vec![Thermostat {
                serial: "T1".to_string(),
                room: "Hall".to_string(),
                current_temperature_c: 20.0,
                current_temperature_f: 68.0,
                target_temperature_c: None,
                target_temperature_f: None,
                hvac_mode: "off".to_string(),
                hvac_action: HvacAction::Idle,
                humidity: None,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut history = ReadingHistory::new();
        let ts = Utc::now();
        assert!(history.insert(reading_at(ts)));
        assert!(!history.insert(reading_at(ts)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_ordering_independent_of_insertion() {
        let mut history = ReadingHistory::new();
        let now = Utc::now();
        history.insert(reading_at(now));
        history.insert(reading_at(now - Duration::hours(2)));
        history.insert(reading_at(now - Duration::hours(1)));

        let stamps: Vec<_> = history.iter().map(|r| r.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
        assert_eq!(history.latest().unwrap().timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_trim_boundary() {
        let mut history = ReadingHistory::new();
        let now = Utc::now();
        let window = Duration::days(90);

        history.insert(reading_at(now - window - Duration::seconds(1)));
        history.insert(reading_at(now - window + Duration::seconds(1)));
        history.insert(reading_at(now));

        assert_eq!(history.trim(window, now), 1);
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.is_within(window, now)));
    }

    #[test]
    fn test_cutoff_rounds_up() {
        use chrono::TimeZone;
        let now = Utc.timestamp_opt(1_000, 500_000).unwrap();
        assert_eq!(retention_cutoff_millis(Duration::seconds(1), now), 999_001);
        let exact = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(retention_cutoff_millis(Duration::seconds(1), exact), 999_000);
    }

    #[test]
    fn test_since() {
        let mut history = ReadingHistory::new();
        let now = Utc::now();
        for h in 0..5 {
            history.insert(reading_at(now - Duration::hours(h)));
        }
        assert_eq!(history.since(now - Duration::minutes(150)).count(), 3);
    }
}
