//! Test doubles shared by the agent integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thermolog_agent::{Ingestor, PollScheduler, RecoveryController};
use thermolog_core::Credential;
use thermolog_fetch::{BucketEntry, FetchError, PollOutcome, RawSnapshot, SessionRefreshHook, SnapshotPoller};
use thermolog_store::{
    default_retention, CredentialStore, MemoryCredentialStore, MemoryReadingStore, StoreError,
};
use tokio::sync::Notify;

pub fn cred(token: &str) -> Credential {
    Credential::new(token, "user.42").unwrap()
}

pub fn sensor_snapshot(temp: f64) -> RawSnapshot {
    RawSnapshot::new(vec![
        BucketEntry::new("kryptonite.S1", json!({"current_temperature": temp, "battery_level": 90.0})),
        BucketEntry::new(
            "shared.T1",
            json!({"current_temperature": 21.0, "target_temperature": 20.5, "target_temperature_type": "heat"}),
        ),
    ])
}

// ============================================================================
// Poller
// ============================================================================

/// Poller that answers from a script and records what it saw.
pub struct ScriptedPoller {
    default: PollOutcome,
    by_token: HashMap<String, PollOutcome>,
    gated_token: Option<String>,
    delay: Duration,
    pub gate: Notify,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedPoller {
    pub fn new(default: PollOutcome) -> Self {
        Self {
            default,
            by_token: HashMap::new(),
            gated_token: None,
            delay: Duration::ZERO,
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(PollOutcome::Success(sensor_snapshot(20.0)))
    }

    pub fn answer(mut self, token: &str, outcome: PollOutcome) -> Self {
        self.by_token.insert(token.to_string(), outcome);
        self
    }

    /// Polls with `token` block until `gate` is notified.
    pub fn gate_token(mut self, token: &str) -> Self {
        self.gated_token = Some(token.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotPoller for ScriptedPoller {
    async fn poll(&self, credential: &Credential) -> PollOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(credential.token.clone());

        if self.gated_token.as_deref() == Some(credential.token.as_str()) {
            self.gate.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.by_token
            .get(&credential.token)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

// ============================================================================
// Hook
// ============================================================================

#[derive(Default)]
pub struct CountingHook {
    calls: AtomicUsize,
}

impl CountingHook {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRefreshHook for CountingHook {
    fn name(&self) -> &str {
        "counting"
    }

    async fn request_refresh(&self) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Credential Store
// ============================================================================

/// Store whose writes always fail.
#[derive(Default)]
pub struct FailingCredentialStore;

#[async_trait]
impl CredentialStore for FailingCredentialStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn update(&self, _credential: &Credential) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn current(&self) -> Result<Option<Credential>, StoreError> {
        Ok(None)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn clear_if_token(&self, _token: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Memory store whose reads can be held at a gate.
#[derive(Default)]
pub struct GatedCredentialStore {
    inner: MemoryCredentialStore,
    hold_reads: AtomicBool,
    held: AtomicUsize,
    pub gate: Notify,
}

impl GatedCredentialStore {
    /// The next `current()` calls block until `release_reads`.
    pub fn hold_reads(&self) {
        self.hold_reads.store(true, Ordering::SeqCst);
    }

    pub fn release_reads(&self) {
        self.hold_reads.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    /// Reads currently blocked at the gate.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for GatedCredentialStore {
    fn name(&self) -> &str {
        "gated"
    }

    async fn update(&self, credential: &Credential) -> Result<(), StoreError> {
        self.inner.update(credential).await
    }

    async fn current(&self) -> Result<Option<Credential>, StoreError> {
        if self.hold_reads.load(Ordering::SeqCst) {
            let released = self.gate.notified();
            self.held.fetch_add(1, Ordering::SeqCst);
            released.await;
            self.held.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.current().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }

    async fn clear_if_token(&self, token: &str) -> Result<bool, StoreError> {
        self.inner.clear_if_token(token).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub scheduler: PollScheduler,
    pub poller: Arc<ScriptedPoller>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub readings: Arc<MemoryReadingStore>,
    pub hook: Arc<CountingHook>,
}

pub fn harness(poller: ScriptedPoller, interval: Duration) -> Harness {
    let poller = Arc::new(poller);
    let credentials = Arc::new(MemoryCredentialStore::new());
    let readings = Arc::new(MemoryReadingStore::new(default_retention()));
    let hook = Arc::new(CountingHook::default());

    let ingestor = Arc::new(Ingestor::new(readings.clone()));
    let recovery = Arc::new(RecoveryController::new(credentials.clone(), hook.clone()));
    let scheduler = PollScheduler::new(interval, poller.clone(), credentials.clone(), ingestor, recovery);

    Harness {
        scheduler,
        poller,
        credentials,
        readings,
        hook,
    }
}

/// Yields until `done` holds.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    while !done() {
        tokio::task::yield_now().await;
    }
}
