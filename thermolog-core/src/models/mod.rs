//! Domain models for thermolog.
//!
//! ## Submodules
//!
//! - [`credential`] - Captured session credential
//! - [`reading`] - Normalized readings (Reading, Sensor, Thermostat)

mod credential;
mod reading;

pub use credential::{mask_secret, Credential};
pub use reading::{celsius_to_fahrenheit, HvacAction, Reading, Sensor, Thermostat};
