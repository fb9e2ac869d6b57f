// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # thermolog Core
//!
//! Core types, models, and traits shared by every thermolog crate.
//!
//! This crate provides the normalized domain model that the vendor's
//! bucket snapshots are decoded into, and nothing that touches the network
//! or the filesystem:
//!
//! - Domain models (credentials, sensors, thermostats, readings)
//! - Error types
//! - The [`ReadingSink`] seam used to hand readings to a downstream service
//!
//! ## Key Types
//!
//! ### Credentials
//! - [`Credential`] - Token/account pair captured from a live session
//!
//! ### Readings
//! - [`Reading`] - One normalized snapshot of every sensor and thermostat
//! - [`Sensor`] - Remote temperature sensor
//! - [`Thermostat`] - Thermostat live state
//! - [`HvacAction`] - What the HVAC system is doing right now

pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    celsius_to_fahrenheit, mask_secret, Credential, HvacAction, Reading, Sensor, Thermostat,
};

// Re-export traits
pub use traits::{NullSink, ReadingSink};
