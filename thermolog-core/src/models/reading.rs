//! Reading-related types.
//!
//! This module contains the normalized form of one vendor snapshot:
//! - [`Reading`] - Timestamped container for every device
//! - [`Sensor`] - Remote temperature sensor
//! - [`Thermostat`] - Thermostat live state
//! - [`HvacAction`] - Current HVAC activity

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Converts Celsius to Fahrenheit at one-decimal precision.
///
/// Matches the vendor's display rounding: `round(c * 9/5 * 10 + 320) / 10`.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    ((celsius * 9.0 / 5.0) * 10.0 + 320.0).round() / 10.0
}

// ============================================================================
// HVAC Action
// ============================================================================

/// What the HVAC system is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacAction {
    /// Heater stage is running.
    Heating,
    /// Compressor is cooling.
    Cooling,
    /// Only the fan is running.
    Fan,
    /// Nothing is running.
    #[default]
    Idle,
}

impl HvacAction {
    /// Derives the action from the raw stage flags.
    ///
    /// Priority is heater, then AC, then fan.
    pub fn from_flags(heater: bool, ac: bool, fan: bool) -> Self {
        if heater {
            Self::Heating
        } else if ac {
            Self::Cooling
        } else if fan {
            Self::Fan
        } else {
            Self::Idle
        }
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Fan => "fan",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for HvacAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Devices
// ============================================================================

/// A remote temperature sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    /// Sensor serial number.
    pub serial: String,
    /// Room display name.
    pub room: String,
    /// Temperature in Celsius, as reported.
    #[serde(rename = "temperature_c")]
    pub temperature_c: f64,
    /// Temperature in Fahrenheit, one decimal.
    #[serde(rename = "temperature_f")]
    pub temperature_f: f64,
    /// Battery level, when the vendor reports one.
    pub battery_level: Option<f64>,
    /// Serial of the thermostat this sensor serves.
    pub linked_thermostat_serial: Option<String>,
    /// Whether the linked thermostat currently uses this sensor for control.
    pub is_active_sensor: bool,
}

/// A thermostat's live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thermostat {
    /// Thermostat serial number.
    pub serial: String,
    /// Room display name.
    pub room: String,
    /// Current temperature in Celsius.
    #[serde(rename = "currentTemperature_c")]
    pub current_temperature_c: f64,
    /// Current temperature in Fahrenheit.
    #[serde(rename = "currentTemperature_f")]
    pub current_temperature_f: f64,
    /// Target temperature in Celsius.
    #[serde(rename = "targetTemperature_c")]
    pub target_temperature_c: Option<f64>,
    /// Target temperature in Fahrenheit.
    #[serde(rename = "targetTemperature_f")]
    pub target_temperature_f: Option<f64>,
    /// Raw mode string (`heat`, `cool`, `range`, `off`, ...).
    pub hvac_mode: String,
    /// Derived HVAC activity.
    pub hvac_action: HvacAction,
    /// Relative humidity percentage.
    pub humidity: Option<f64>,
}

// ============================================================================
// Reading
// ============================================================================

/// One normalized snapshot of every sensor and thermostat on the account.
///
/// Readings are immutable once created. The timestamp is the capture time
/// (poll completion), truncated to millisecond precision so that it is
/// stable across storage round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Remote sensors, in bucket order.
    pub sensors: Vec<Sensor>,
    /// Thermostats, in bucket order.
    pub thermostats: Vec<Thermostat>,
}

impl Reading {
    /// Creates a reading.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyReading`] when there are no sensors and no
    /// thermostats; an empty reading signals a failed parse, not a real
    /// empty house.
    pub fn new(
        timestamp: DateTime<Utc>,
        sensors: Vec<Sensor>,
        thermostats: Vec<Thermostat>,
    ) -> Result<Self, CoreError> {
        let reading = Self {
            timestamp: timestamp.trunc_subsecs(3),
            sensors,
            thermostats,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Checks the non-empty invariant.
    ///
    /// Use after deserializing a reading from an untrusted source.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyReading`] if the reading has no devices.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::EmptyReading);
        }
        Ok(())
    }

    /// Returns true if the reading has neither sensors nor thermostats.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.thermostats.is_empty()
    }

    /// Timestamp as Unix milliseconds (the storage key).
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Age of this reading relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// Returns true if this reading falls inside the retention window.
    pub fn is_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) <= window
    }

    /// Looks up a sensor by serial.
    pub fn sensor(&self, serial: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.serial == serial)
    }

    /// Looks up a thermostat by serial.
    pub fn thermostat(&self, serial: &str) -> Option<&Thermostat> {
        self.thermostats.iter().find(|t| t.serial == serial)
    }
}
