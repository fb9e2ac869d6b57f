// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # thermolog Store
//!
//! Durable state for the thermolog agent.
//!
//! - **CredentialStore**: the single live vendor credential (file, keychain, memory)
//! - **ReadingStore**: deduplicated, retention-bounded reading history (SQLite, memory)
//! - **Config**: agent configuration file
//! - **Persistence**: owner-only atomic JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use thermolog_store::{ReadingStore, SqliteReadingStore, default_retention};
//!
//! let store = SqliteReadingStore::open("readings.db", default_retention()).await?;
//! let outcome = store.merge(&reading).await?;
//! if outcome.inserted {
//!     println!("{} readings stored", store.len().await?);
//! }
//! ```

pub mod config;
pub mod credential_store;
pub mod error;
pub mod history;
pub mod persistence;
pub mod reading_store;
pub mod sqlite;

pub use config::{
    Config, CredentialsBackend, PollConfig, ReadingsBackend, RecoveryConfig, SinkConfig,
    StorageConfig, VendorConfig,
};
pub use credential_store::{
    CredentialStore, FileCredentialStore, KeychainCredentialStore, MemoryCredentialStore,
};
pub use error::StoreError;
pub use history::{retention_cutoff_millis, ReadingHistory};
pub use persistence::{
    default_config_dir, default_config_path, default_credential_path, default_data_dir,
    default_database_path, load_json, load_json_opt, save_json,
};
pub use reading_store::{default_retention, MemoryReadingStore, MergeOutcome, ReadingStore};
pub use sqlite::SqliteReadingStore;
