//! Scheduler state machine: arming, coalescing, recovery, re-arming.

mod common;

use common::{
    cred, harness, wait_until, CountingHook, FailingCredentialStore, GatedCredentialStore, ScriptedPoller,
};
use std::sync::Arc;
use std::time::Duration;
use thermolog_agent::{Ingestor, PollScheduler, RecoveryController, SchedulerPhase, TickOutcome};
use thermolog_fetch::PollOutcome;
use thermolog_store::{default_retention, CredentialStore, MemoryReadingStore, ReadingStore};

const INTERVAL: Duration = Duration::from_secs(300);

async fn sleep_past_ticks(ticks: u32) {
    tokio::time::sleep(INTERVAL * ticks + Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_credential_update_arms_and_polls_immediately() {
    let h = harness(ScriptedPoller::succeeding(), INTERVAL);
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Disarmed);

    let pending = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    assert_eq!(pending.await.unwrap(), TickOutcome::Stored);

    assert_eq!(h.poller.calls(), 1);
    assert_eq!(h.readings.len().await.unwrap(), 1);
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Armed);
    assert_eq!(h.credentials.current().await.unwrap().unwrap().token, "token-a");
}

#[tokio::test(start_paused = true)]
async fn test_timer_polls_once_per_interval() {
    let h = harness(ScriptedPoller::succeeding(), INTERVAL);
    h.scheduler.on_credential_update(&cred("token-a")).await.unwrap().await.unwrap();

    sleep_past_ticks(1).await;
    assert_eq!(h.poller.calls(), 2);

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(h.poller.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_credential_replace_leaves_one_timer() {
    let h = harness(ScriptedPoller::succeeding(), INTERVAL);

    h.scheduler.on_credential_update(&cred("token-a")).await.unwrap().await.unwrap();
    h.scheduler.on_credential_update(&cred("token-b")).await.unwrap().await.unwrap();
    assert_eq!(h.poller.calls(), 2);

    // Two timers would mean two polls here.
    sleep_past_ticks(1).await;
    assert_eq!(h.poller.calls(), 3);
    assert_eq!(h.poller.tokens().last().map(String::as_str), Some("token-b"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_polls_are_coalesced() {
    let h = harness(
        ScriptedPoller::succeeding().delay(Duration::from_secs(150)),
        Duration::from_secs(60),
    );

    // Immediate poll runs 0..150; ticks at 60 and 120 find it in flight.
    // Tick 180 polls until 330; 240 and 300 are dropped; 360 polls again.
    let _immediate = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(400)).await;

    assert_eq!(h.poller.max_active(), 1);
    assert_eq!(h.poller.calls(), 3);
}

#[tokio::test]
async fn test_tick_during_poll_is_coalesced() {
    let h = harness(ScriptedPoller::succeeding().gate_token("token-a"), INTERVAL);
    h.credentials.update(&cred("token-a")).await.unwrap();

    let scheduler = h.scheduler.clone();
    let first = tokio::spawn(async move { scheduler.poll_now().await });
    wait_until(|| h.poller.calls() == 1).await;

    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Polling);
    assert_eq!(h.scheduler.poll_now().await, TickOutcome::Coalesced);

    h.poller.gate.notify_one();
    assert_eq!(first.await.unwrap(), TickOutcome::Stored);
    assert_eq!(h.poller.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_expiry_clears_and_disarms() {
    let h = harness(ScriptedPoller::new(PollOutcome::AuthExpired), INTERVAL);

    let pending = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    assert_eq!(pending.await.unwrap(), TickOutcome::AuthExpired);

    assert!(h.credentials.current().await.unwrap().is_none());
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Disarmed);
    assert_eq!(h.hook.calls(), 1);

    // No timer left behind.
    sleep_past_ticks(3).await;
    assert_eq!(h.poller.calls(), 1);
    assert_eq!(h.hook.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_expiry_then_new_credential_rearms() {
    let poller = ScriptedPoller::succeeding().answer("token-a", PollOutcome::AuthExpired);
    let h = harness(poller, INTERVAL);

    let expired = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    assert_eq!(expired.await.unwrap(), TickOutcome::AuthExpired);

    let fresh = h.scheduler.on_credential_update(&cred("token-b")).await.unwrap();
    assert_eq!(fresh.await.unwrap(), TickOutcome::Stored);
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Armed);
}

#[tokio::test]
async fn test_stale_auth_expiry_spares_fresh_credential() {
    let poller = ScriptedPoller::succeeding()
        .answer("token-a", PollOutcome::AuthExpired)
        .gate_token("token-a");
    let h = harness(poller, INTERVAL);

    let pending_a = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    wait_until(|| h.poller.calls() == 1).await;

    // Replace the credential while the old poll is still out.
    let pending_b = h.scheduler.on_credential_update(&cred("token-b")).await.unwrap();

    h.poller.gate.notify_one();
    assert_eq!(pending_a.await.unwrap(), TickOutcome::StaleAuthExpiry);
    assert_eq!(pending_b.await.unwrap(), TickOutcome::Stored);

    assert_eq!(h.poller.tokens(), ["token-a", "token-b"]);
    assert_eq!(h.credentials.current().await.unwrap().unwrap().token, "token-b");
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Armed);
    assert_eq!(h.hook.calls(), 0);
}

#[tokio::test]
async fn test_new_credential_polled_right_after_in_flight_poll() {
    let poller = ScriptedPoller::succeeding()
        .answer("token-a", PollOutcome::TransientFailure("slow vendor".to_string()))
        .gate_token("token-a");
    let h = harness(poller, INTERVAL);

    let pending_a = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    wait_until(|| h.poller.calls() == 1).await;
    let pending_b = h.scheduler.on_credential_update(&cred("token-b")).await.unwrap();

    h.poller.gate.notify_one();
    assert!(matches!(pending_a.await.unwrap(), TickOutcome::TransientFailure(_)));

    // No interval has passed; token-b still got its poll.
    assert_eq!(pending_b.await.unwrap(), TickOutcome::Stored);
    assert_eq!(h.poller.tokens(), ["token-a", "token-b"]);
    assert_eq!(h.poller.max_active(), 1);
    assert_eq!(h.readings.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_credential_burst_polls_only_the_latest() {
    let h = harness(ScriptedPoller::succeeding().gate_token("token-a"), INTERVAL);

    let pending_a = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    wait_until(|| h.poller.calls() == 1).await;
    let pending_b = h.scheduler.on_credential_update(&cred("token-b")).await.unwrap();
    let pending_c = h.scheduler.on_credential_update(&cred("token-c")).await.unwrap();

    h.poller.gate.notify_one();
    assert_eq!(pending_a.await.unwrap(), TickOutcome::Stored);
    assert_eq!(pending_b.await.unwrap(), TickOutcome::Coalesced);
    assert!(matches!(
        pending_c.await.unwrap(),
        TickOutcome::Stored | TickOutcome::Duplicate
    ));

    assert_eq!(h.poller.tokens(), ["token-a", "token-c"]);
}

#[tokio::test]
async fn test_poll_credential_matches_its_generation() {
    let poller = Arc::new(ScriptedPoller::succeeding().answer("token-b", PollOutcome::AuthExpired));
    let credentials = Arc::new(GatedCredentialStore::default());
    let hook = Arc::new(CountingHook::default());
    let readings: Arc<dyn ReadingStore> = Arc::new(MemoryReadingStore::new(default_retention()));
    let scheduler = PollScheduler::new(
        INTERVAL,
        poller.clone(),
        credentials.clone(),
        Arc::new(Ingestor::new(readings)),
        Arc::new(RecoveryController::new(credentials.clone(), hook.clone())),
    );
    scheduler.on_credential_update(&cred("token-a")).await.unwrap().await.unwrap();

    // A poll armed under token-a stalls while loading the credential.
    credentials.hold_reads();
    let tick = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.poll_now().await })
    };
    wait_until(|| credentials.held() == 1).await;

    // token-b arrives inside that window.
    let update = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.on_credential_update(&cred("token-b")).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    credentials.release_reads();

    assert!(matches!(
        tick.await.unwrap(),
        TickOutcome::Stored | TickOutcome::Duplicate
    ));
    let pending_b = update.await.unwrap().unwrap();
    assert_eq!(pending_b.await.unwrap(), TickOutcome::AuthExpired);

    // The rejection of token-b ran the full recovery.
    assert_eq!(poller.tokens(), ["token-a", "token-a", "token-b"]);
    assert_eq!(hook.calls(), 1);
    assert!(credentials.current().await.unwrap().is_none());
    assert_eq!(scheduler.phase().await, SchedulerPhase::Disarmed);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_stays_armed() {
    let h = harness(
        ScriptedPoller::new(PollOutcome::TransientFailure("connection reset".to_string())),
        INTERVAL,
    );

    let pending = h.scheduler.on_credential_update(&cred("token-a")).await.unwrap();
    assert!(matches!(pending.await.unwrap(), TickOutcome::TransientFailure(_)));
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Armed);
    assert!(h.credentials.current().await.unwrap().is_some());

    sleep_past_ticks(1).await;
    assert_eq!(h.poller.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_credential_write_does_not_arm() {
    let poller = Arc::new(ScriptedPoller::succeeding());
    let credentials: Arc<dyn CredentialStore> = Arc::new(FailingCredentialStore);
    let readings: Arc<dyn ReadingStore> = Arc::new(MemoryReadingStore::new(default_retention()));
    let scheduler = PollScheduler::new(
        INTERVAL,
        poller.clone(),
        credentials.clone(),
        Arc::new(Ingestor::new(readings)),
        Arc::new(RecoveryController::without_hook(credentials)),
    );

    assert!(scheduler.on_credential_update(&cred("token-a")).await.is_err());
    assert_eq!(scheduler.phase().await, SchedulerPhase::Disarmed);

    sleep_past_ticks(2).await;
    assert_eq!(poller.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cleared_credential_disarms_on_next_tick() {
    let h = harness(ScriptedPoller::succeeding(), INTERVAL);
    h.scheduler.on_credential_update(&cred("token-a")).await.unwrap().await.unwrap();

    h.credentials.clear().await.unwrap();
    sleep_past_ticks(1).await;

    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Disarmed);
    assert_eq!(h.poller.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_from_stored_credential() {
    let h = harness(ScriptedPoller::succeeding(), INTERVAL);
    assert!(h.scheduler.resume().await.unwrap().is_none());
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Disarmed);

    h.credentials.update(&cred("token-a")).await.unwrap();
    let pending = h.scheduler.resume().await.unwrap().unwrap();
    assert_eq!(pending.await.unwrap(), TickOutcome::Stored);
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Armed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_timer() {
    let h = harness(ScriptedPoller::succeeding(), INTERVAL);
    h.scheduler.on_credential_update(&cred("token-a")).await.unwrap().await.unwrap();

    h.scheduler.shutdown().await;
    assert_eq!(h.scheduler.phase().await, SchedulerPhase::Disarmed);

    sleep_past_ticks(2).await;
    assert_eq!(h.poller.calls(), 1);
}

#[tokio::test]
async fn test_manual_poll_without_credential() {
    let h = harness(ScriptedPoller::succeeding(), INTERVAL);
    assert_eq!(h.scheduler.poll_now().await, TickOutcome::NoCredential);
    assert_eq!(h.poller.calls(), 0);
}
