//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thermolog_agent::{IngestOutcome, TickOutcome};
use thermolog_core::{Credential, Reading};

use crate::commands::ingest::IngestReport;

// ============================================================================
// Output Types
// ============================================================================

/// A list of readings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsOutput<'a> {
    pub count: usize,
    pub readings: &'a [Reading],
}

/// The stored credential, masked.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOutput {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl From<Option<&Credential>> for CredentialOutput {
    fn from(credential: Option<&Credential>) -> Self {
        Self {
            present: credential.is_some(),
            account_id: credential.map(|c| c.account_id.clone()),
            token: credential.map(Credential::masked_token),
            captured_at: credential.map(|c| c.captured_at),
        }
    }
}

/// One step's outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&TickOutcome> for StepOutput {
    fn from(outcome: &TickOutcome) -> Self {
        let detail = match outcome {
            TickOutcome::Discarded(reason)
            | TickOutcome::TransientFailure(reason)
            | TickOutcome::StorageFailure(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            outcome: outcome.label(),
            detail,
        }
    }
}

impl From<&IngestOutcome> for StepOutput {
    fn from(outcome: &IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Stored { .. } => Self {
                outcome: "stored",
                detail: None,
            },
            IngestOutcome::Duplicate => Self {
                outcome: "duplicate",
                detail: None,
            },
            IngestOutcome::Discarded(reason) => Self {
                outcome: "discarded",
                detail: Some(reason.clone()),
            },
        }
    }
}

/// Result of applying one credential event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<StepOutput>,
    pub credential_updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<StepOutput>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a list of readings.
    pub fn format_readings(&self, readings: &[Reading]) -> Result<String> {
        self.format(&ReadingsOutput {
            count: readings.len(),
            readings,
        })
    }

    /// Formats the stored credential.
    pub fn format_credential(&self, credential: Option<&Credential>) -> Result<String> {
        self.format(&CredentialOutput::from(credential))
    }

    /// Formats a poll outcome.
    pub fn format_tick(&self, outcome: &TickOutcome) -> Result<String> {
        self.format(&StepOutput::from(outcome))
    }

    /// Formats an ingest report.
    pub fn format_ingest(&self, report: &IngestReport) -> Result<String> {
        self.format(&IngestOutput {
            snapshot: report.snapshot.as_ref().map(StepOutput::from),
            credential_updated: report.credential_updated,
            poll: report.poll.as_ref().map(StepOutput::from),
        })
    }
}
