//! Poll scheduling.
//!
//! The scheduler owns at most one periodic timer. A credential update
//! persists the credential, replaces the timer, and fires one poll right
//! away. Only one poll is ever in flight: a timer tick that finds one
//! running is dropped, while the poll for a new credential waits its turn.
//!
//! ```text
//! Disarmed --credential--> Armed --tick--> Polling --ok/transient--> Armed
//!                            ^                 |
//!                            +--credential--+  +--auth expired--> Disarmed
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thermolog_core::Credential;
use thermolog_fetch::{PollOutcome, SnapshotPoller};
use thermolog_store::CredentialStore;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::error::AgentError;
use crate::ingest::{IngestOutcome, Ingestor};
use crate::recovery::{Disarm, RecoveryController, RecoveryOutcome};

/// Default interval between scheduled polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Handle to a poll that was started in the background.
pub type PendingPoll = JoinHandle<TickOutcome>;

// ============================================================================
// Outcomes
// ============================================================================

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No timer; waiting for a credential.
    Disarmed,
    /// Timer running, no poll in flight.
    Armed,
    /// A poll is in flight.
    Polling,
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disarmed => "disarmed",
            Self::Armed => "armed",
            Self::Polling => "polling",
        })
    }
}

/// Result of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new reading was stored.
    Stored,
    /// The reading was already stored.
    Duplicate,
    /// The snapshot held nothing usable.
    Discarded(String),
    /// Network, timeout, status, or body failure.
    TransientFailure(String),
    /// The vendor rejected the token; recovery ran.
    AuthExpired,
    /// The vendor rejected a token that had already been replaced.
    StaleAuthExpiry,
    /// Another poll was in flight.
    Coalesced,
    /// The scheduler was disarmed before the poll started.
    NotArmed,
    /// No credential is stored.
    NoCredential,
    /// Durable storage failed.
    StorageFailure(String),
}

impl TickOutcome {
    /// Short label for logs and output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Duplicate => "duplicate",
            Self::Discarded(_) => "discarded",
            Self::TransientFailure(_) => "transient_failure",
            Self::AuthExpired => "auth_expired",
            Self::StaleAuthExpiry => "stale_auth_expiry",
            Self::Coalesced => "coalesced",
            Self::NotArmed => "not_armed",
            Self::NoCredential => "no_credential",
            Self::StorageFailure(_) => "storage_failure",
        }
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discarded(reason) => write!(f, "discarded: {reason}"),
            Self::TransientFailure(reason) => write!(f, "transient failure: {reason}"),
            Self::StorageFailure(reason) => write!(f, "storage failure: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// First poll for the credential armed under this generation.
    Immediate(u64),
    Timer,
    Manual,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::Immediate(_) => "immediate",
            Self::Timer => "timer",
            Self::Manual => "manual",
        }
    }
}

// ============================================================================
// Shared State
// ============================================================================

#[derive(Default)]
struct ArmState {
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl ArmState {
    fn armed_generation(&self) -> Option<u64> {
        self.timer.as_ref().map(|_| self.generation)
    }

    fn stop_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

struct Shared {
    interval: Duration,
    poller: Arc<dyn SnapshotPoller>,
    credentials: Arc<dyn CredentialStore>,
    ingestor: Arc<Ingestor>,
    recovery: Arc<RecoveryController>,
    state: Mutex<ArmState>,
    /// Held for the whole of a poll.
    flight: Mutex<()>,
    polls_started: AtomicU64,
}

impl Shared {
    fn polling(&self) -> bool {
        self.flight.try_lock().is_err()
    }
}

/// Disarms only if the arm generation a poll started under is still current.
struct GenerationDisarm<'a> {
    shared: &'a Shared,
    generation: Option<u64>,
}

#[async_trait]
impl<'a> Disarm for GenerationDisarm<'a> {
    async fn disarm(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        match (state.armed_generation(), self.generation) {
            (None, _) => true,
            (Some(current), Some(expected)) if current == expected => {
                state.stop_timer();
                info!(generation = current, "Scheduler disarmed");
                true
            }
            (Some(current), expected) => {
                debug!(current, ?expected, "Ignoring disarm from an older generation");
                false
            }
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Single-flight periodic poller.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct PollScheduler {
    shared: Arc<Shared>,
}

impl PollScheduler {
    /// Creates a disarmed scheduler.
    pub fn new(
        interval: Duration,
        poller: Arc<dyn SnapshotPoller>,
        credentials: Arc<dyn CredentialStore>,
        ingestor: Arc<Ingestor>,
        recovery: Arc<RecoveryController>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                interval,
                poller,
                credentials,
                ingestor,
                recovery,
                state: Mutex::new(ArmState::default()),
                flight: Mutex::new(()),
                polls_started: AtomicU64::new(0),
            }),
        }
    }

    /// Interval between scheduled polls.
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Current phase.
    pub async fn phase(&self) -> SchedulerPhase {
        let armed = self.shared.state.lock().await.armed_generation().is_some();
        if self.shared.polling() {
            SchedulerPhase::Polling
        } else if armed {
            SchedulerPhase::Armed
        } else {
            SchedulerPhase::Disarmed
        }
    }

    /// Number of vendor requests started so far.
    pub fn polls_started(&self) -> u64 {
        self.shared.polls_started.load(Ordering::Acquire)
    }

    /// Persists `credential`, (re-)arms the timer, and starts an immediate poll.
    ///
    /// The timer is only started once the credential is durable. If a poll
    /// with the previous credential is still out, the immediate poll runs as
    /// soon as it finishes rather than being dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential could not be stored; the
    /// scheduler state is left as it was.
    #[instrument(skip_all, fields(account = %credential.account_id, token = %credential.masked_token()))]
    pub async fn on_credential_update(&self, credential: &Credential) -> Result<PendingPoll, AgentError> {
        let mut state = self.shared.state.lock().await;
        if let Err(e) = self.shared.credentials.update(credential).await {
            error!(error = %e, "Failed to persist credential, not arming");
            return Err(e.into());
        }
        let generation = self.arm(&mut state);
        drop(state);

        info!(generation, "Scheduler armed with new credential");
        Ok(self.spawn_poll(Trigger::Immediate(generation)))
    }

    /// Arms from the stored credential, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be read.
    pub async fn resume(&self) -> Result<Option<PendingPoll>, AgentError> {
        let mut state = self.shared.state.lock().await;
        let Some(credential) = self.shared.credentials.current().await? else {
            debug!("No stored credential, staying disarmed");
            return Ok(None);
        };
        let generation = self.arm(&mut state);
        drop(state);

        info!(generation, account = %credential.account_id, "Scheduler resumed from stored credential");
        Ok(Some(self.spawn_poll(Trigger::Immediate(generation))))
    }

    /// Polls once now with the stored credential, armed or not.
    pub async fn poll_now(&self) -> TickOutcome {
        run_poll(Arc::clone(&self.shared), Trigger::Manual).await
    }

    /// Stops the timer. Returns true if it was running.
    pub async fn disarm(&self) -> bool {
        let stopped = self.shared.state.lock().await.stop_timer();
        if stopped {
            info!("Scheduler disarmed");
        }
        stopped
    }

    /// Disarms. Polls already in flight finish on their own.
    pub async fn shutdown(&self) {
        self.disarm().await;
    }

    fn arm(&self, state: &mut ArmState) -> u64 {
        if state.stop_timer() {
            debug!(generation = state.generation, "Replaced previous timer");
        }
        state.generation += 1;
        state.timer = Some(spawn_timer(Arc::downgrade(&self.shared), self.shared.interval));
        state.generation
    }

    fn spawn_poll(&self, trigger: Trigger) -> PendingPoll {
        tokio::spawn(run_poll(Arc::clone(&self.shared), trigger))
    }
}

impl fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollScheduler")
            .field("interval", &self.shared.interval)
            .field("polling", &self.shared.polling())
            .field("polls_started", &self.polls_started())
            .finish_non_exhaustive()
    }
}

fn spawn_timer(shared: Weak<Shared>, interval: Duration) -> JoinHandle<()> {
    let start = Instant::now() + interval;
    tokio::spawn(async move {
        let mut ticker = time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            // Detached so that aborting the timer never cuts a poll short.
            tokio::spawn(run_poll(shared, Trigger::Timer));
        }
    })
}

#[instrument(skip_all, fields(trigger = trigger.as_str()))]
async fn run_poll(shared: Arc<Shared>, trigger: Trigger) -> TickOutcome {
    let _flight = match trigger {
        Trigger::Immediate(_) => shared.flight.lock().await,
        Trigger::Timer | Trigger::Manual => {
            let Ok(flight) = shared.flight.try_lock() else {
                debug!("Poll already in flight, coalescing");
                return TickOutcome::Coalesced;
            };
            flight
        }
    };

    // Generation and credential are read under one lock so they always
    // belong to the same arm.
    let (generation, loaded) = {
        let state = shared.state.lock().await;
        let generation = state.armed_generation();
        if generation.is_none() && trigger != Trigger::Manual {
            debug!("Scheduler disarmed, skipping poll");
            return TickOutcome::NotArmed;
        }
        if let Trigger::Immediate(requested) = trigger {
            if generation != Some(requested) {
                debug!(requested, ?generation, "Credential replaced before its first poll");
                return TickOutcome::Coalesced;
            }
        }
        (generation, shared.credentials.current().await)
    };

    let credential = match loaded {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            warn!("No stored credential");
            GenerationDisarm { shared: &shared, generation }.disarm().await;
            return TickOutcome::NoCredential;
        }
        Err(e) => {
            error!(error = %e, "Failed to load credential");
            return TickOutcome::StorageFailure(e.to_string());
        }
    };

    shared.polls_started.fetch_add(1, Ordering::AcqRel);
    let outcome = shared.poller.poll(&credential).await;
    debug!(outcome = outcome.label(), "Poll finished");

    match outcome {
        PollOutcome::Success(snapshot) => match shared.ingestor.ingest(&snapshot, Utc::now()).await {
            Ok(IngestOutcome::Stored { .. }) => TickOutcome::Stored,
            Ok(IngestOutcome::Duplicate) => TickOutcome::Duplicate,
            Ok(IngestOutcome::Discarded(reason)) => TickOutcome::Discarded(reason),
            Err(e) => {
                error!(error = %e, "Failed to store reading");
                TickOutcome::StorageFailure(e.to_string())
            }
        },
        PollOutcome::TransientFailure(reason) => {
            warn!(reason = %reason, "Poll failed, waiting for next tick");
            TickOutcome::TransientFailure(reason)
        }
        PollOutcome::AuthExpired => {
            warn!(account = %credential.account_id, "Vendor rejected credential");
            let target = GenerationDisarm { shared: &shared, generation };
            match shared.recovery.handle_expiry(&credential, &target).await {
                RecoveryOutcome::Recovered { .. } => TickOutcome::AuthExpired,
                RecoveryOutcome::Superseded => TickOutcome::StaleAuthExpiry,
            }
        }
    }
}
