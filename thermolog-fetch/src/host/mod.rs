//! Host APIs for thermolog.
//!
//! - [`keychain`] - Secure secret storage (system keychain)
//! - [`http`] - HTTP client with tracing and domain allowlist
//! - [`process`] - Subprocess execution for external hooks

pub mod http;
pub mod keychain;
pub mod process;

pub use http::HttpClient;
pub use keychain::{KeychainApi, SystemKeychain};
pub use process::{ProcessOutput, ProcessRunner};
