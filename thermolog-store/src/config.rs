//! Agent configuration.
//!
//! Loaded from a JSON file; every section and field has a default, so an
//! empty or missing file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thermolog_fetch::client::{DEFAULT_AUTH_SCHEME, DEFAULT_BASE_URL};
use thermolog_fetch::VendorSettings;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{
    default_credential_path, default_database_path, load_json_opt, save_json,
};
use crate::reading_store::DEFAULT_RETENTION_DAYS;

// ============================================================================
// Sections
// ============================================================================

/// Poll cadence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between scheduled polls.
    pub interval_secs: u64,
    /// Upper bound on one poll request.
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            timeout_secs: 30,
        }
    }
}

/// Vendor endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    /// API base URL.
    pub base_url: String,
    /// Scheme word placed before the token in `Authorization`.
    pub auth_scheme: String,
    /// Hosts the token may be sent to.
    pub allowed_domains: Vec<String>,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            allowed_domains: vec!["nest.com".to_string()],
        }
    }
}

/// Where readings are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReadingsBackend {
    /// SQLite file; `None` means the default data path.
    Sqlite {
        /// Database file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// Process memory only.
    Memory,
}

impl Default for ReadingsBackend {
    fn default() -> Self {
        Self::Sqlite { path: None }
    }
}

/// Where the credential is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CredentialsBackend {
    /// Owner-only JSON file; `None` means the default data path.
    File {
        /// Credential file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// System keychain.
    Keychain,
    /// Process memory only.
    Memory,
}

impl Default for CredentialsBackend {
    fn default() -> Self {
        Self::File { path: None }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Reading store backend.
    pub readings: ReadingsBackend,
    /// Credential store backend.
    pub credentials: CredentialsBackend,
    /// Days of history to keep.
    pub retention_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            readings: ReadingsBackend::default(),
            credentials: CredentialsBackend::default(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Session-refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Command run after the vendor rejects the token.
    pub command: Option<Vec<String>>,
    /// Upper bound on the command.
    pub timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 30,
        }
    }
}

/// Reading sink settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Ingestion endpoint that receives each new reading.
    pub url: Option<String>,
}

// ============================================================================
// Config
// ============================================================================

/// Full agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Poll cadence.
    pub poll: PollConfig,
    /// Vendor endpoint.
    pub vendor: VendorConfig,
    /// Storage backends.
    pub storage: StorageConfig,
    /// Session refresh.
    pub recovery: RecoveryConfig,
    /// Reading sink.
    pub sink: SinkConfig,
}

impl Config {
    /// Loads a config file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable, malformed, or
    /// fails validation.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let config = match load_json_opt::<Config>(path).await {
            Ok(Some(config)) => {
                info!(path = %path.display(), "Loaded config");
                config
            }
            Ok(None) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Config::default()
            }
            Err(StoreError::Serialization(e)) => {
                return Err(StoreError::Config(format!("{}: {e}", path.display())));
            }
            Err(e) => return Err(e),
        };

        config.validate()?;
        Ok(config)
    }

    /// Writes the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_json(path, self).await
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] naming the first bad field.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.poll.interval_secs == 0 {
            return Err(StoreError::Config("poll.interval_secs must be positive".to_string()));
        }
        if self.poll.timeout_secs == 0 {
            return Err(StoreError::Config("poll.timeout_secs must be positive".to_string()));
        }
        if self.storage.retention_days <= 0 {
            return Err(StoreError::Config("storage.retention_days must be positive".to_string()));
        }
        if self.vendor.auth_scheme.trim().is_empty() {
            return Err(StoreError::Config("vendor.auth_scheme must not be empty".to_string()));
        }
        if let Some(cmd) = &self.recovery.command {
            if cmd.first().is_none_or(|c| c.trim().is_empty()) {
                return Err(StoreError::Config("recovery.command must name a program".to_string()));
            }
        }
        Ok(())
    }

    /// Interval between scheduled polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    /// Retention window.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.storage.retention_days)
    }

    /// Recovery command timeout.
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery.timeout_secs)
    }

    /// Vendor client settings derived from this config.
    pub fn vendor_settings(&self) -> VendorSettings {
        VendorSettings {
            base_url: self.vendor.base_url.clone(),
            auth_scheme: self.vendor.auth_scheme.clone(),
            timeout: Duration::from_secs(self.poll.timeout_secs),
            allowed_domains: self.vendor.allowed_domains.clone(),
        }
    }

    /// Resolved readings database path, if the backend is SQLite.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.storage.readings {
            ReadingsBackend::Sqlite { path } => Some(path.clone().unwrap_or_else(default_database_path)),
            ReadingsBackend::Memory => None,
        }
    }

    /// Resolved credential file path, if the backend is a file.
    pub fn credential_path(&self) -> Option<PathBuf> {
        match &self.storage.credentials {
            CredentialsBackend::File { path } => Some(path.clone().unwrap_or_else(default_credential_path)),
            CredentialsBackend::Keychain | CredentialsBackend::Memory => None,
        }
    }
}
