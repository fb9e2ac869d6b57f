//! Text output formatting with colors.

use chrono::{DateTime, Local, Utc};
use thermolog_agent::{IngestOutcome, TickOutcome};
use thermolog_core::{Credential, HvacAction, Reading, Sensor, Thermostat};

use crate::commands::ingest::IngestReport;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Batteries below this level are highlighted.
const LOW_BATTERY: f64 = 20.0;

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats one reading as a block.
    pub fn format_reading(&self, reading: &Reading) -> String {
        let mut lines = vec![self.bold(&format_timestamp(reading.timestamp))];

        for sensor in &reading.sensors {
            lines.push(self.format_sensor(sensor));
        }
        for thermostat in &reading.thermostats {
            lines.push(self.format_thermostat(thermostat));
        }

        lines.join("\n")
    }

    /// Formats a list of readings, oldest first.
    pub fn format_readings(&self, readings: &[Reading]) -> String {
        if readings.is_empty() {
            return self.dim("No readings stored");
        }

        let mut blocks: Vec<String> = readings.iter().map(|r| self.format_reading(r)).collect();
        blocks.push(self.dim(&format!("{} reading(s)", readings.len())));
        blocks.join("\n\n")
    }

    fn format_sensor(&self, sensor: &Sensor) -> String {
        let mut line = format!(
            "  {:<16} {:>5.1}°C {:>5.1}°F",
            sensor.room, sensor.temperature_c, sensor.temperature_f
        );

        if let Some(battery) = sensor.battery_level {
            let text = format!("battery {battery:.0}%");
            line.push_str("  ");
            if battery < LOW_BATTERY {
                line.push_str(&self.red(&text));
            } else {
                line.push_str(&self.dim(&text));
            }
        }
        if sensor.is_active_sensor {
            line.push_str("  ");
            line.push_str(&self.cyan("active"));
        }

        line
    }

    fn format_thermostat(&self, thermostat: &Thermostat) -> String {
        let mut line = format!(
            "  {:<16} {:>5.1}°C {:>5.1}°F",
            thermostat.room, thermostat.current_temperature_c, thermostat.current_temperature_f
        );

        if let Some(target) = thermostat.target_temperature_c {
            line.push_str(&format!("  -> {target:.1}°C"));
        }
        line.push_str(&format!("  {}", thermostat.hvac_mode));
        line.push_str("  ");
        line.push_str(&self.format_action(thermostat.hvac_action));
        if let Some(humidity) = thermostat.humidity {
            line.push_str(&self.dim(&format!("  {humidity:.0}% RH")));
        }

        line
    }

    fn format_action(&self, action: HvacAction) -> String {
        match action {
            HvacAction::Heating => self.red(action.as_str()),
            HvacAction::Cooling => self.cyan(action.as_str()),
            HvacAction::Fan => self.yellow(action.as_str()),
            HvacAction::Idle => self.dim(action.as_str()),
        }
    }

    /// Formats the stored credential, masked.
    pub fn format_credential(&self, credential: Option<&Credential>) -> String {
        let Some(credential) = credential else {
            return self.yellow("No credential stored");
        };

        [
            format!("Account:  {}", self.cyan(&credential.account_id)),
            format!("Token:    {}", credential.masked_token()),
            format!("Captured: {}", format_timestamp(credential.captured_at)),
        ]
        .join("\n")
    }

    /// Formats a poll outcome.
    pub fn format_tick(&self, outcome: &TickOutcome) -> String {
        let text = format!("Poll: {outcome}");
        match outcome {
            TickOutcome::Stored | TickOutcome::Duplicate => self.green(&text),
            TickOutcome::Coalesced | TickOutcome::NotArmed | TickOutcome::Discarded(_) => {
                self.dim(&text)
            }
            TickOutcome::NoCredential | TickOutcome::TransientFailure(_) => self.yellow(&text),
            TickOutcome::AuthExpired | TickOutcome::StaleAuthExpiry | TickOutcome::StorageFailure(_) => {
                self.red(&text)
            }
        }
    }

    /// Formats an ingest report.
    pub fn format_ingest(&self, report: &IngestReport) -> String {
        let mut lines = Vec::new();

        match &report.snapshot {
            Some(IngestOutcome::Stored {
                sensors, thermostats, ..
            }) => lines.push(self.green(&format!(
                "Snapshot: stored ({sensors} sensors, {thermostats} thermostats)"
            ))),
            Some(IngestOutcome::Duplicate) => lines.push(self.dim("Snapshot: already stored")),
            Some(IngestOutcome::Discarded(reason)) => {
                lines.push(self.yellow(&format!("Snapshot: discarded ({reason})")));
            }
            None => {}
        }

        if report.credential_updated {
            lines.push("Credential: updated".to_string());
        } else {
            lines.push(self.dim("Credential: unchanged"));
        }

        if let Some(poll) = &report.poll {
            lines.push(self.format_tick(poll));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Color Helpers
    // ========================================================================

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Local wall-clock rendering of a UTC timestamp.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
