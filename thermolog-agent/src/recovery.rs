//! Recovery after the vendor rejects a token.

use async_trait::async_trait;
use std::sync::Arc;
use thermolog_core::Credential;
use thermolog_fetch::{NoopRefreshHook, SessionRefreshHook};
use thermolog_store::CredentialStore;
use tracing::{debug, error, info, instrument, warn};

/// Something that stops polling with the rejected credential.
///
/// Returns false if the credential was replaced in the meantime, in which
/// case the poller stays armed with the fresh one.
#[async_trait]
pub trait Disarm: Send + Sync {
    /// Disarms unless superseded.
    async fn disarm(&self) -> bool;
}

/// What recovery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Credential cleared, polling stopped, refresh requested.
    Recovered {
        /// Whether the refresh hook reported success.
        refresh_requested: bool,
    },
    /// A newer credential arrived while the rejected poll was in flight.
    Superseded,
}

/// Clears the rejected credential, disarms, and asks for a fresh session.
pub struct RecoveryController {
    credentials: Arc<dyn CredentialStore>,
    hook: Arc<dyn SessionRefreshHook>,
}

impl RecoveryController {
    /// Creates a controller with the given refresh hook.
    pub fn new(credentials: Arc<dyn CredentialStore>, hook: Arc<dyn SessionRefreshHook>) -> Self {
        Self { credentials, hook }
    }

    /// Creates a controller that never refreshes anything.
    pub fn without_hook(credentials: Arc<dyn CredentialStore>) -> Self {
        Self::new(credentials, Arc::new(NoopRefreshHook))
    }

    /// Name of the installed refresh hook.
    pub fn hook_name(&self) -> &str {
        self.hook.name()
    }

    /// Handles an `AuthExpired` outcome for `rejected`.
    ///
    /// Never fails: storage and hook errors are logged. The hook is not
    /// retried; the next credential event is the next chance to recover.
    #[instrument(skip_all, fields(account = %rejected.account_id, token = %rejected.masked_token()))]
    pub async fn handle_expiry(&self, rejected: &Credential, target: &dyn Disarm) -> RecoveryOutcome {
        match self.credentials.clear_if_token(&rejected.token).await {
            Ok(true) => info!("Cleared rejected credential"),
            Ok(false) => debug!("Stored credential no longer matches the rejected token"),
            Err(e) => error!(error = %e, "Failed to clear rejected credential"),
        }

        if !target.disarm().await {
            info!("Credential replaced during poll, keeping the new one");
            return RecoveryOutcome::Superseded;
        }

        let refresh_requested = match self.hook.request_refresh().await {
            Ok(()) => {
                info!(hook = self.hook.name(), "Requested session refresh");
                true
            }
            Err(e) => {
                warn!(hook = self.hook.name(), error = %e, "Session refresh failed");
                false
            }
        };

        RecoveryOutcome::Recovered { refresh_requested }
    }
}

impl std::fmt::Debug for RecoveryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryController")
            .field("credentials", &self.credentials.name())
            .field("hook", &self.hook.name())
            .finish()
    }
}
