//! The agent facade and its wiring from configuration.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thermolog_core::ReadingSink;
use thermolog_fetch::{
    CommandRefreshHook, HttpReadingSink, NoopRefreshHook, SessionRefreshHook, SnapshotPoller,
    SystemKeychain, VendorClient,
};
use thermolog_store::{
    Config, CredentialStore, CredentialsBackend, FileCredentialStore, KeychainCredentialStore,
    MemoryCredentialStore, MemoryReadingStore, ReadingStore, ReadingsBackend, SqliteReadingStore,
};
use tracing::{debug, error, info, instrument};

use crate::error::AgentError;
use crate::event::CredentialEvent;
use crate::ingest::{IngestOutcome, Ingestor};
use crate::recovery::RecoveryController;
use crate::scheduler::{PendingPoll, PollScheduler, TickOutcome, DEFAULT_POLL_INTERVAL};

// ============================================================================
// Store Wiring
// ============================================================================

/// Opens the credential store named by `config`.
pub fn open_credential_store(config: &Config) -> Arc<dyn CredentialStore> {
    match &config.storage.credentials {
        CredentialsBackend::File { .. } => {
            let path = config
                .credential_path()
                .unwrap_or_else(thermolog_store::default_credential_path);
            Arc::new(FileCredentialStore::new(path))
        }
        CredentialsBackend::Keychain => Arc::new(KeychainCredentialStore::new(Arc::new(SystemKeychain::new()))),
        CredentialsBackend::Memory => Arc::new(MemoryCredentialStore::new()),
    }
}

/// Opens the reading store named by `config`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub async fn open_reading_store(config: &Config) -> Result<Arc<dyn ReadingStore>, AgentError> {
    let retention = config.retention();
    match &config.storage.readings {
        ReadingsBackend::Sqlite { .. } => {
            let path = config
                .database_path()
                .unwrap_or_else(thermolog_store::default_database_path);
            Ok(Arc::new(SqliteReadingStore::open(path, retention).await?))
        }
        ReadingsBackend::Memory => Ok(Arc::new(MemoryReadingStore::new(retention))),
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles an [`Agent`] from its parts.
pub struct AgentBuilder {
    poller: Arc<dyn SnapshotPoller>,
    credentials: Arc<dyn CredentialStore>,
    readings: Arc<dyn ReadingStore>,
    interval: Duration,
    sink: Option<Arc<dyn ReadingSink>>,
    hook: Arc<dyn SessionRefreshHook>,
}

impl AgentBuilder {
    /// Poll interval (default 5 minutes).
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Forwards new readings to `sink`.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ReadingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Hook run after the vendor rejects the token.
    #[must_use]
    pub fn refresh_hook(mut self, hook: Arc<dyn SessionRefreshHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Builds a disarmed agent.
    pub fn build(self) -> Agent {
        let mut ingestor = Ingestor::new(Arc::clone(&self.readings));
        if let Some(sink) = self.sink {
            ingestor = ingestor.with_sink(sink);
        }
        let ingestor = Arc::new(ingestor);
        let recovery = Arc::new(RecoveryController::new(Arc::clone(&self.credentials), self.hook));
        let scheduler = PollScheduler::new(
            self.interval,
            self.poller,
            Arc::clone(&self.credentials),
            Arc::clone(&ingestor),
            recovery,
        );

        Agent {
            scheduler,
            ingestor,
            credentials: self.credentials,
            readings: self.readings,
        }
    }
}

// ============================================================================
// Agent
// ============================================================================

/// What handling one credential event did.
#[derive(Debug, Default)]
pub struct EventOutcome {
    /// Result of ingesting the event's snapshot, if it carried one that
    /// could be stored.
    pub snapshot: Option<IngestOutcome>,
    /// The immediate poll started by a credential update.
    pub poll: Option<PendingPoll>,
}

impl EventOutcome {
    /// True if the event updated the credential.
    pub fn credential_updated(&self) -> bool {
        self.poll.is_some()
    }
}

/// Credential-lifecycle polling agent.
pub struct Agent {
    scheduler: PollScheduler,
    ingestor: Arc<Ingestor>,
    credentials: Arc<dyn CredentialStore>,
    readings: Arc<dyn ReadingStore>,
}

impl Agent {
    /// Starts a builder with the three required parts.
    pub fn builder(
        poller: Arc<dyn SnapshotPoller>,
        credentials: Arc<dyn CredentialStore>,
        readings: Arc<dyn ReadingStore>,
    ) -> AgentBuilder {
        AgentBuilder {
            poller,
            credentials,
            readings,
            interval: DEFAULT_POLL_INTERVAL,
            sink: None,
            hook: Arc::new(NoopRefreshHook),
        }
    }

    /// Builds an agent from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a store cannot be opened or the vendor client,
    /// refresh hook, or sink settings are invalid.
    pub async fn from_config(config: &Config) -> Result<Self, AgentError> {
        let credentials = open_credential_store(config);
        let readings = open_reading_store(config).await?;
        let poller = Arc::new(VendorClient::new(config.vendor_settings())?);

        let mut builder = Self::builder(poller, credentials, readings).interval(config.poll_interval());
        if let Some(argv) = &config.recovery.command {
            builder = builder.refresh_hook(Arc::new(CommandRefreshHook::from_argv(
                argv,
                config.recovery_timeout(),
            )?));
        }
        if let Some(url) = &config.sink.url {
            builder = builder.sink(Arc::new(HttpReadingSink::new(url.clone())?));
        }

        let agent = builder.build();
        debug!(
            credentials = agent.credentials.name(),
            readings = agent.readings.name(),
            interval_secs = config.poll.interval_secs,
            "Agent configured"
        );
        Ok(agent)
    }

    /// Arms from the stored credential, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be read.
    pub async fn start(&self) -> Result<Option<PendingPoll>, AgentError> {
        self.scheduler.resume().await
    }

    /// Applies one credential-source event.
    ///
    /// A snapshot is ingested first. A complete credential then replaces the
    /// stored one and re-arms the scheduler; a partial one is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error only if the new credential could not be persisted.
    #[instrument(skip_all, fields(has_snapshot = event.snapshot.is_some()))]
    pub async fn handle_event(&self, event: CredentialEvent) -> Result<EventOutcome, AgentError> {
        let mut outcome = EventOutcome::default();

        if let Some(snapshot) = &event.snapshot {
            match self.ingestor.ingest(snapshot, Utc::now()).await {
                Ok(result) => outcome.snapshot = Some(result),
                Err(e) => error!(error = %e, "Failed to store observed snapshot"),
            }
        }

        match event.credential() {
            Some(credential) => {
                outcome.poll = Some(self.scheduler.on_credential_update(&credential).await?);
            }
            None if event.token.is_some() || event.account_id.is_some() => {
                info!("Event carried an incomplete credential, keeping the stored one");
            }
            None => {}
        }

        Ok(outcome)
    }

    /// Polls once with the stored credential.
    pub async fn poll_once(&self) -> TickOutcome {
        self.scheduler.poll_now().await
    }

    /// Disarms the scheduler.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    /// The credential store.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// The reading store.
    pub fn readings(&self) -> &Arc<dyn ReadingStore> {
        &self.readings
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("scheduler", &self.scheduler)
            .field("credentials", &self.credentials.name())
            .field("readings", &self.readings.name())
            .finish_non_exhaustive()
    }
}
