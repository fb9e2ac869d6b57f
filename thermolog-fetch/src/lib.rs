// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # thermolog Fetch
//!
//! Everything that talks to the vendor or the host system.
//!
//! ## Vendor Protocol
//!
//! - [`api`] - Wire types for the `app_launch` snapshot endpoint
//! - [`parser`] - Bucket snapshot to [`thermolog_core::Reading`]
//! - [`client`] - Poll request and outcome classification
//!
//! ## Host APIs
//!
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//! - [`host::process`] - Subprocess execution
//! - [`host::keychain`] - Secure secret storage
//!
//! ## Side Channels
//!
//! - [`refresh`] - Session-refresh hooks used after token expiry
//! - [`sink`] - HTTP delivery of new readings

pub mod api;
pub mod client;
pub mod error;
pub mod host;
pub mod parser;
pub mod refresh;
pub mod sink;

// Errors
pub use error::{FetchError, HttpError, KeychainError, ParseError, ProcessError};

// Vendor protocol
pub use api::{AppLaunchRequest, BucketEntry, RawSnapshot, KNOWN_BUCKET_TYPES};
pub use client::{classify_status, PollOutcome, SnapshotPoller, StatusClass, VendorClient, VendorSettings};
pub use parser::{parse_snapshot, BucketKind, BucketParser};

// Host APIs
pub use host::{
    http::HttpClient,
    keychain::{KeychainApi, SystemKeychain},
    process::{ProcessOutput, ProcessRunner},
};

// Side channels
pub use refresh::{CommandRefreshHook, NoopRefreshHook, SessionRefreshHook};
pub use sink::HttpReadingSink;
