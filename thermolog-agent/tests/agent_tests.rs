//! Agent facade: credential events, resume, one-shot polls.

mod common;

use common::{cred, sensor_snapshot, CountingHook, FailingCredentialStore, ScriptedPoller};
use std::sync::Arc;
use std::time::Duration;
use thermolog_agent::{Agent, CredentialEvent, IngestOutcome, SchedulerPhase, TickOutcome};
use thermolog_fetch::PollOutcome;
use thermolog_store::{
    default_retention, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    MemoryReadingStore, ReadingStore,
};

fn memory_agent(poller: ScriptedPoller) -> (Agent, Arc<ScriptedPoller>) {
    let poller = Arc::new(poller);
    let agent = Agent::builder(
        poller.clone(),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryReadingStore::new(default_retention())),
    )
    .interval(Duration::from_secs(60))
    .build();
    (agent, poller)
}

#[tokio::test]
async fn test_event_with_snapshot_and_credential() {
    let (agent, poller) = memory_agent(ScriptedPoller::succeeding());
    let event = CredentialEvent {
        snapshot: Some(sensor_snapshot(19.5)),
        ..CredentialEvent::credential_only("token-a", "user.42")
    };

    let outcome = agent.handle_event(event).await.unwrap();

    assert!(matches!(outcome.snapshot, Some(IngestOutcome::Stored { sensors: 1, thermostats: 1, .. })));
    assert!(outcome.credential_updated());
    outcome.poll.unwrap().await.unwrap();

    assert_eq!(poller.calls(), 1);
    assert_eq!(agent.credentials().current().await.unwrap().unwrap().token, "token-a");
    assert!(agent.readings().len().await.unwrap() >= 1);
    agent.shutdown().await;
}

#[tokio::test]
async fn test_partial_credential_keeps_stored_one() {
    let (agent, poller) = memory_agent(ScriptedPoller::succeeding());
    agent
        .handle_event(CredentialEvent::credential_only("token-a", "user.42"))
        .await
        .unwrap()
        .poll
        .unwrap()
        .await
        .unwrap();

    let partial = CredentialEvent::from_json(r#"{"token":"token-b","accountId":null}"#).unwrap();
    let outcome = agent.handle_event(partial).await.unwrap();

    assert!(!outcome.credential_updated());
    assert_eq!(agent.credentials().current().await.unwrap().unwrap().token, "token-a");
    assert_eq!(poller.calls(), 1);
    agent.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_only_event_does_not_arm() {
    let (agent, poller) = memory_agent(ScriptedPoller::succeeding());
    let event = CredentialEvent {
        snapshot: Some(sensor_snapshot(18.0)),
        ..CredentialEvent::default()
    };

    let outcome = agent.handle_event(event).await.unwrap();

    assert!(outcome.snapshot.unwrap().is_stored());
    assert!(outcome.poll.is_none());
    assert_eq!(agent.scheduler().phase().await, SchedulerPhase::Disarmed);
    assert_eq!(poller.calls(), 0);
}

#[tokio::test]
async fn test_unusable_snapshot_is_discarded() {
    let (agent, _poller) = memory_agent(ScriptedPoller::succeeding());
    let event = CredentialEvent::from_json(
        r#"{"snapshot":{"updated_buckets":[{"object_key":"where.home","value":{"wheres":[]}}]}}"#,
    )
    .unwrap();

    let outcome = agent.handle_event(event).await.unwrap();
    assert!(matches!(outcome.snapshot, Some(IngestOutcome::Discarded(_))));
    assert_eq!(agent.readings().len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_credential_write_is_an_error() {
    let agent = Agent::builder(
        Arc::new(ScriptedPoller::succeeding()),
        Arc::new(FailingCredentialStore),
        Arc::new(MemoryReadingStore::new(default_retention())),
    )
    .build();

    let result = agent
        .handle_event(CredentialEvent::credential_only("token-a", "user.42"))
        .await;

    assert!(result.is_err());
    assert_eq!(agent.scheduler().phase().await, SchedulerPhase::Disarmed);
}

#[tokio::test]
async fn test_start_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credential.json");
    FileCredentialStore::new(&path).update(&cred("token-a")).await.unwrap();

    let poller = Arc::new(ScriptedPoller::succeeding());
    let agent = Agent::builder(
        poller.clone(),
        Arc::new(FileCredentialStore::new(&path)),
        Arc::new(MemoryReadingStore::new(default_retention())),
    )
    .build();

    let pending = agent.start().await.unwrap().unwrap();
    assert_eq!(pending.await.unwrap(), TickOutcome::Stored);
    assert_eq!(agent.scheduler().phase().await, SchedulerPhase::Armed);
    assert_eq!(poller.tokens(), vec!["token-a".to_string()]);
    agent.shutdown().await;
}

#[tokio::test]
async fn test_poll_once_auth_expired_runs_recovery() {
    let poller = Arc::new(ScriptedPoller::new(PollOutcome::AuthExpired));
    let credentials = Arc::new(MemoryCredentialStore::with_credential(cred("token-a")));
    let hook = Arc::new(CountingHook::default());
    let agent = Agent::builder(
        poller.clone(),
        credentials.clone(),
        Arc::new(MemoryReadingStore::new(default_retention())),
    )
    .refresh_hook(hook.clone())
    .build();

    assert_eq!(agent.poll_once().await, TickOutcome::AuthExpired);
    assert!(credentials.current().await.unwrap().is_none());
    assert_eq!(hook.calls(), 1);

    assert_eq!(agent.poll_once().await, TickOutcome::NoCredential);
    assert_eq!(poller.calls(), 1);
}

#[tokio::test]
async fn test_poll_once_stores_reading() {
    let poller = Arc::new(ScriptedPoller::succeeding());
    let readings = Arc::new(MemoryReadingStore::new(default_retention()));
    let agent = Agent::builder(
        poller,
        Arc::new(MemoryCredentialStore::with_credential(cred("token-a"))),
        readings.clone(),
    )
    .build();

    assert_eq!(agent.poll_once().await, TickOutcome::Stored);
    let latest = readings.latest().await.unwrap().unwrap();
    assert_eq!(latest.sensors[0].temperature_c, 20.0);
    assert_eq!(agent.scheduler().phase().await, SchedulerPhase::Disarmed);
}
