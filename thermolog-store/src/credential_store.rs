//! Durable storage for the single live credential.
//!
//! There is no local expiry: a credential stays until it is replaced or
//! the vendor rejects it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thermolog_core::Credential;
use thermolog_fetch::KeychainApi;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::persistence::{load_json_opt, remove_file_if_exists, save_json};

/// Keychain service for the vendor credential.
pub const KEYCHAIN_SERVICE: &str = "vendor";

/// Keychain account for the vendor credential.
pub const KEYCHAIN_ACCOUNT: &str = "vendor_credential";

// ============================================================================
// Credential Store Trait
// ============================================================================

/// Holds at most one credential, durably.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Replaces any stored credential and persists the new one.
    async fn update(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Returns the stored credential, if any.
    async fn current(&self) -> Result<Option<Credential>, StoreError>;

    /// Removes the stored credential.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Removes the stored credential only if it carries `token`.
    ///
    /// Returns true if a credential was removed. A newer credential stored
    /// after `token` was rejected is left alone.
    async fn clear_if_token(&self, token: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// File Store
// ============================================================================

/// Credential kept in an owner-only JSON file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Creates a store backed by `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn name(&self) -> &str {
        "file"
    }

    #[instrument(skip(self, credential), fields(path = %self.path.display(), account = %credential.account_id))]
    async fn update(&self, credential: &Credential) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        save_json(&self.path, credential).await?;
        info!(token = %credential.masked_token(), "Credential stored");
        Ok(())
    }

    async fn current(&self) -> Result<Option<Credential>, StoreError> {
        let _guard = self.lock.lock().await;
        load_json_opt(&self.path).await
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        if remove_file_if_exists(&self.path).await? {
            info!("Credential cleared");
        }
        Ok(())
    }

    async fn clear_if_token(&self, token: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let stored: Option<Credential> = load_json_opt(&self.path).await?;
        match stored {
            Some(cred) if cred.token == token => {
                remove_file_if_exists(&self.path).await?;
                info!(account = %cred.account_id, "Rejected credential cleared");
                Ok(true)
            }
            Some(_) => {
                debug!("Stored credential was replaced; not clearing");
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Keychain Store
// ============================================================================

/// Credential kept in the system keychain as a JSON secret.
pub struct KeychainCredentialStore {
    keychain: Arc<dyn KeychainApi>,
    lock: Mutex<()>,
}

impl KeychainCredentialStore {
    /// Creates a store over a keychain implementation.
    pub fn new(keychain: Arc<dyn KeychainApi>) -> Self {
        Self {
            keychain,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        let secret = self.keychain.get(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).await?;
        secret
            .map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }
}

impl std::fmt::Debug for KeychainCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainCredentialStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    fn name(&self) -> &str {
        "keychain"
    }

    async fn update(&self, credential: &Credential) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let secret = serde_json::to_string(credential)?;
        self.keychain
            .set(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT, &secret)
            .await?;
        info!(account = %credential.account_id, token = %credential.masked_token(), "Credential stored in keychain");
        Ok(())
    }

    async fn current(&self) -> Result<Option<Credential>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.keychain.delete(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).await?;
        info!("Credential cleared from keychain");
        Ok(())
    }

    async fn clear_if_token(&self, token: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        match self.load().await? {
            Some(cred) if cred.token == token => {
                self.keychain.delete(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).await?;
                info!(account = %cred.account_id, "Rejected credential cleared from keychain");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// Non-durable store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: RwLock::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn update(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.inner.write().await = Some(credential.clone());
        Ok(())
    }

    async fn current(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.inner.read().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.inner.write().await = None;
        Ok(())
    }

    async fn clear_if_token(&self, token: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.as_ref().is_some_and(|c| c.token == token) {
            *inner = None;
            return Ok(true);
        }
        Ok(false)
    }
}
