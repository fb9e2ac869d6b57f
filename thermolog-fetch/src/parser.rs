//! Bucket snapshot parser.
//!
//! Turns a [`RawSnapshot`] into a normalized [`Reading`]. Buckets are
//! dispatched by key prefix into a closed set of typed variants; auxiliary
//! buckets (rooms, sensor links, device placement) only enrich the sensors
//! and thermostats and are dropped afterwards.
//!
//! The parser is pure: no I/O, no clock. The caller supplies the capture
//! time.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thermolog_core::{celsius_to_fahrenheit, HvacAction, Reading, Sensor, Thermostat};
use tracing::{debug, warn};

use crate::api::{
    RawSnapshot, DEVICE_TYPE, LINK_SETTINGS_TYPE, LOCATION_TYPE, REMOTE_SENSOR_TYPE,
    SHARED_STATE_TYPE,
};
use crate::error::ParseError;

/// Room label for a sensor whose `where_id` is unknown.
pub const UNKNOWN_SENSOR_ROOM: &str = "Unknown";

/// Room label for a thermostat without a resolvable device bucket.
pub const FALLBACK_THERMOSTAT_ROOM: &str = "Thermostat";

/// Mode reported when the shared bucket carries none.
pub const DEFAULT_HVAC_MODE: &str = "off";

// ============================================================================
// Bucket Kinds
// ============================================================================

/// Bucket type resolved from a key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    /// Remote temperature sensor.
    RemoteSensor,
    /// Thermostat live state.
    SharedState,
    /// Thermostat device record.
    Device,
    /// Room-name table.
    Location,
    /// Sensor-to-thermostat links.
    LinkSettings,
    /// Anything else; ignored.
    Other,
}

impl BucketKind {
    /// Splits a bucket key into its kind and id suffix.
    ///
    /// Keys without a `.` separator are [`BucketKind::Other`].
    pub fn split_key(key: &str) -> (Self, &str) {
        let Some((prefix, id)) = key.split_once('.') else {
            return (Self::Other, key);
        };

        let kind = match prefix {
            REMOTE_SENSOR_TYPE => Self::RemoteSensor,
            SHARED_STATE_TYPE => Self::SharedState,
            DEVICE_TYPE => Self::Device,
            LOCATION_TYPE => Self::Location,
            LINK_SETTINGS_TYPE => Self::LinkSettings,
            _ => Self::Other,
        };
        (kind, id)
    }
}

// ============================================================================
// Typed Bucket Values
// ============================================================================

#[derive(Debug, Deserialize)]
struct RemoteSensorValue {
    current_temperature: Option<f64>,
    where_id: Option<String>,
    battery_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SharedStateValue {
    current_temperature: Option<f64>,
    target_temperature: Option<f64>,
    target_temperature_type: Option<String>,
    hvac_heater_state: Option<bool>,
    hvac_ac_state: Option<bool>,
    hvac_fan_state: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DeviceValue {
    where_id: Option<String>,
    current_humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LocationValue {
    wheres: Option<Vec<WhereEntry>>,
}

#[derive(Debug, Deserialize)]
struct WhereEntry {
    where_id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkSettingsValue {
    associated_rcs_sensors: Option<Vec<String>>,
    active_rcs_sensors: Option<Vec<String>>,
}

/// One decoded bucket.
#[derive(Debug)]
enum Bucket {
    RemoteSensor(RemoteSensorValue),
    SharedState(SharedStateValue),
    Device(DeviceValue),
    Location(LocationValue),
    LinkSettings(LinkSettingsValue),
    Other,
}

impl Bucket {
    /// Decodes a bucket value by kind.
    fn decode(kind: BucketKind, value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            BucketKind::RemoteSensor => Self::RemoteSensor(RemoteSensorValue::deserialize(value)?),
            BucketKind::SharedState => Self::SharedState(SharedStateValue::deserialize(value)?),
            BucketKind::Device => Self::Device(DeviceValue::deserialize(value)?),
            BucketKind::Location => Self::Location(LocationValue::deserialize(value)?),
            BucketKind::LinkSettings => Self::LinkSettings(LinkSettingsValue::deserialize(value)?),
            BucketKind::Other => Self::Other,
        })
    }
}

/// Sensors served by one thermostat.
#[derive(Debug)]
struct SensorLink<'a> {
    thermostat_serial: &'a str,
    associated: Vec<String>,
    active: Vec<String>,
}

// ============================================================================
// Parser
// ============================================================================

/// Decodes vendor bucket snapshots into readings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketParser;

impl BucketParser {
    /// Creates a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parses a snapshot into a reading stamped with `captured_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::NoDevices`] when no sensor or thermostat could
    /// be built from the snapshot.
    pub fn parse(
        &self,
        snapshot: &RawSnapshot,
        captured_at: DateTime<Utc>,
    ) -> Result<Reading, ParseError> {
        // Flatten; a repeated key keeps its last value.
        let flat: BTreeMap<&str, &serde_json::Value> = snapshot
            .updated_buckets
            .iter()
            .map(|entry| (entry.object_key.as_str(), &entry.value))
            .collect();

        let mut sensors_raw: Vec<(&str, &str, RemoteSensorValue)> = Vec::new();
        let mut shared_raw: Vec<(&str, SharedStateValue)> = Vec::new();
        let mut devices: HashMap<&str, DeviceValue> = HashMap::new();
        let mut rooms: HashMap<String, String> = HashMap::new();
        let mut links: Vec<SensorLink<'_>> = Vec::new();

        for (&key, &value) in &flat {
            let (kind, id) = BucketKind::split_key(key);
            let bucket = match Bucket::decode(kind, value) {
                Ok(bucket) => bucket,
                Err(e) => {
                    warn!(bucket = %key, error = %e, "Skipping malformed bucket");
                    continue;
                }
            };

            match bucket {
                Bucket::RemoteSensor(v) => sensors_raw.push((key, id, v)),
                Bucket::SharedState(v) => shared_raw.push((id, v)),
                Bucket::Device(v) => {
                    devices.insert(id, v);
                }
                Bucket::Location(v) => {
                    for entry in v.wheres.unwrap_or_default() {
                        if let Some(name) = entry.name {
                            rooms.insert(entry.where_id, name);
                        }
                    }
                }
                Bucket::LinkSettings(v) => links.push(SensorLink {
                    thermostat_serial: id,
                    associated: v.associated_rcs_sensors.unwrap_or_default(),
                    active: v.active_rcs_sensors.unwrap_or_default(),
                }),
                Bucket::Other => {}
            }
        }

        let sensors: Vec<Sensor> = sensors_raw
            .into_iter()
            .filter_map(|(key, serial, v)| build_sensor(key, serial, v, &rooms, &links))
            .collect();

        let thermostats: Vec<Thermostat> = shared_raw
            .into_iter()
            .filter_map(|(serial, v)| build_thermostat(serial, v, &devices, &rooms))
            .collect();

        let buckets = flat.len();
        debug!(
            buckets,
            rooms = rooms.len(),
            sensors = sensors.len(),
            thermostats = thermostats.len(),
            "Parsed snapshot"
        );

        Reading::new(captured_at, sensors, thermostats).map_err(|_| ParseError::NoDevices { buckets })
    }

    /// Parses a JSON snapshot document.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Malformed`] if the document is not a bucket
    /// snapshot, or [`ParseError::NoDevices`] as for [`Self::parse`].
    pub fn parse_str(&self, json: &str, captured_at: DateTime<Utc>) -> Result<Reading, ParseError> {
        let snapshot: RawSnapshot = serde_json::from_str(json)?;
        self.parse(&snapshot, captured_at)
    }
}

/// Parses a snapshot with a default parser.
///
/// # Errors
///
/// See [`BucketParser::parse`].
pub fn parse_snapshot(snapshot: &RawSnapshot, captured_at: DateTime<Utc>) -> Result<Reading, ParseError> {
    BucketParser::new().parse(snapshot, captured_at)
}

fn build_sensor(
    key: &str,
    serial: &str,
    value: RemoteSensorValue,
    rooms: &HashMap<String, String>,
    links: &[SensorLink<'_>],
) -> Option<Sensor> {
    let Some(temperature_c) = value.current_temperature else {
        warn!(bucket = %key, "Sensor bucket has no current temperature");
        return None;
    };

    let room = value
        .where_id
        .as_deref()
        .and_then(|id| rooms.get(id))
        .map_or_else(|| UNKNOWN_SENSOR_ROOM.to_string(), Clone::clone);

    // First thermostat (in key order) that lists this sensor wins.
    let link = links
        .iter()
        .find(|link| link.associated.iter().any(|k| k == key));

    Some(Sensor {
        serial: serial.to_string(),
        room,
        temperature_c,
        temperature_f: celsius_to_fahrenheit(temperature_c),
        battery_level: value.battery_level,
        linked_thermostat_serial: link.map(|l| l.thermostat_serial.to_string()),
        is_active_sensor: link.is_some_and(|l| l.active.iter().any(|k| k == key)),
    })
}

fn build_thermostat(
    serial: &str,
    value: SharedStateValue,
    devices: &HashMap<&str, DeviceValue>,
    rooms: &HashMap<String, String>,
) -> Option<Thermostat> {
    let Some(current_c) = value.current_temperature else {
        warn!(serial = %serial, "Shared bucket has no current temperature");
        return None;
    };

    let device = devices.get(serial);
    let room = device
        .and_then(|d| d.where_id.as_deref())
        .and_then(|id| rooms.get(id))
        .map_or_else(|| FALLBACK_THERMOSTAT_ROOM.to_string(), Clone::clone);

    Some(Thermostat {
        serial: serial.to_string(),
        room,
        current_temperature_c: current_c,
        current_temperature_f: celsius_to_fahrenheit(current_c),
        target_temperature_c: value.target_temperature,
        target_temperature_f: value.target_temperature.map(celsius_to_fahrenheit),
        hvac_mode: value
            .target_temperature_type
            .unwrap_or_else(|| DEFAULT_HVAC_MODE.to_string()),
        hvac_action: HvacAction::from_flags(
            value.hvac_heater_state.unwrap_or(false),
            value.hvac_ac_state.unwrap_or(false),
            value.hvac_fan_state.unwrap_or(false),
        ),
        humidity: device.and_then(|d| d.current_humidity),
    })
}

// ============================================================================
// Tests
// ============================================================================
