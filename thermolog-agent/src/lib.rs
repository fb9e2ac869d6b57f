// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # thermolog Agent
//!
//! The credential lifecycle: arm on a fresh token, poll on a fixed
//! interval, recover when the vendor rejects the token.
//!
//! - [`PollScheduler`] - single-flight periodic poller with one timer at most
//! - [`RecoveryController`] - clear, disarm, and request a session refresh
//! - [`Ingestor`] - parse, merge, and forward snapshots
//! - [`Agent`] - the facade the CLI drives
//!
//! ## Usage
//!
//! ```ignore
//! use thermolog_agent::{Agent, CredentialEvent};
//!
//! let agent = Agent::from_config(&config).await?;
//! agent.start().await?;
//! agent.handle_event(CredentialEvent::from_json(line)?).await?;
//! ```

pub mod agent;
pub mod error;
pub mod event;
pub mod ingest;
pub mod recovery;
pub mod scheduler;

pub use agent::{open_credential_store, open_reading_store, Agent, AgentBuilder, EventOutcome};
pub use error::AgentError;
pub use event::CredentialEvent;
pub use ingest::{IngestOutcome, Ingestor};
pub use recovery::{Disarm, RecoveryController, RecoveryOutcome};
pub use scheduler::{
    PendingPoll, PollScheduler, SchedulerPhase, TickOutcome, DEFAULT_POLL_INTERVAL,
};
