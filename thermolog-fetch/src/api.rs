//! Wire types for the vendor's `app_launch` snapshot endpoint.
//!
//! The endpoint answers with every bucket of every requested type. Buckets
//! are opaque key/value pairs; decoding them is the parser's job.

use serde::{Deserialize, Serialize};

// ============================================================================
// Bucket Types
// ============================================================================

/// Remote temperature sensor buckets.
pub const REMOTE_SENSOR_TYPE: &str = "kryptonite";

/// Thermostat live-state buckets.
pub const SHARED_STATE_TYPE: &str = "shared";

/// Thermostat device buckets (placement, humidity).
pub const DEVICE_TYPE: &str = "device";

/// Room-name table buckets.
pub const LOCATION_TYPE: &str = "where";

/// Sensor-to-thermostat link buckets.
pub const LINK_SETTINGS_TYPE: &str = "rcs_settings";

/// Bucket types requested on every poll.
pub const KNOWN_BUCKET_TYPES: [&str; 5] = [
    LOCATION_TYPE,
    DEVICE_TYPE,
    SHARED_STATE_TYPE,
    REMOTE_SENSOR_TYPE,
    LINK_SETTINGS_TYPE,
];

// ============================================================================
// Request / Response
// ============================================================================

/// Body of the `app_launch` request.
///
/// `known_bucket_versions` is always empty so the vendor returns a full
/// snapshot rather than a diff.
#[derive(Debug, Clone, Serialize)]
pub struct AppLaunchRequest {
    /// Bucket types to include.
    pub known_bucket_types: Vec<String>,
    /// Versions already held by the caller.
    pub known_bucket_versions: Vec<serde_json::Value>,
}

impl AppLaunchRequest {
    /// Builds the full-snapshot request for the fixed allow-list.
    pub fn full_snapshot() -> Self {
        Self {
            known_bucket_types: KNOWN_BUCKET_TYPES.iter().map(|t| (*t).to_string()).collect(),
            known_bucket_versions: Vec::new(),
        }
    }
}

/// A single bucket as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// Composite key: `<type>.<id>`.
    pub object_key: String,
    /// Bucket payload; shape depends on the type prefix.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Vendor revision counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_revision: Option<i64>,
    /// Vendor modification time (ms). Not used as capture time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_timestamp: Option<i64>,
}

impl BucketEntry {
    /// Creates a bucket entry with just a key and value.
    pub fn new(object_key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            object_key: object_key.into(),
            value,
            object_revision: None,
            object_timestamp: None,
        }
    }
}

/// A raw vendor snapshot: the `app_launch` response body.
///
/// Also the shape the credential source forwards when it observes a
/// snapshot in a live session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Every bucket in the snapshot, in wire order.
    pub updated_buckets: Vec<BucketEntry>,
}

impl RawSnapshot {
    /// Creates a snapshot from bucket entries.
    pub fn new(updated_buckets: Vec<BucketEntry>) -> Self {
        Self { updated_buckets }
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.updated_buckets.len()
    }

    /// Returns true if the snapshot carries no buckets.
    pub fn is_empty(&self) -> bool {
        self.updated_buckets.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_snapshot_request_body() {
        let body = serde_json::to_value(AppLaunchRequest::full_snapshot()).unwrap();
        assert_eq!(body["known_bucket_types"].as_array().unwrap().len(), 5);
        assert_eq!(body["known_bucket_versions"], serde_json::json!([]));
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let json = r#"{
            "updated_buckets": [
                {"object_key": "shared.ABC", "object_revision": 12, "object_timestamp": 1700000000000, "value": {}}
            ],
            "service_urls": {"urls": {}},
            "weather_for_structures": {}
        }"#;
        let snapshot: RawSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.updated_buckets[0].object_revision, Some(12));
    }

    #[test]
    fn test_response_without_buckets_is_rejected() {
        let result: Result<RawSnapshot, _> = serde_json::from_str(r#"{"error": "nope"}"#);
        assert!(result.is_err());
    }
}
