//! Scenario tests for the connectivity supervisor
//!
//! Drives the supervisor tick-by-tick against a scripted messaging client
//! with synthetic timestamps, covering the full retry lifecycle: arming,
//! burst retries, cadence widening, link-layer outages, and recovery.

use std::time::{Duration, Instant};
use uplink::provisioning::{apply_submission, PortalSubmission};
use uplink::testing::mocks::MockClient;
use uplink::transport::topics;
use uplink::{BrokerConfig, ConfigStore, Phase, RetryPolicy, Supervisor, SupervisorEvent};

const BURST: Duration = Duration::from_millis(3000);
const WIDENED: Duration = Duration::from_millis(60_000);
const TICK: Duration = Duration::from_millis(25);

fn supervisor_with(client: &MockClient) -> Supervisor<MockClient> {
    Supervisor::new(client.clone(), RetryPolicy::default(), "garden-node")
}

fn stored_config() -> BrokerConfig {
    BrokerConfig {
        broker_address: "10.0.0.5".to_string(),
        broker_port: "1883".to_string(),
        broker_user: "sensor".to_string(),
        broker_pass: "hunter2".to_string(),
        has_stored_broker: true,
    }
}

/// No stored broker: the supervisor is never armed, stays idle, and the
/// client is never asked to connect.
#[tokio::test]
async fn unprovisioned_device_never_connects() {
    let client = MockClient::new();
    let mut supervisor = supervisor_with(&client);
    let config = BrokerConfig::default();
    assert!(!config.has_stored_broker);

    // the runtime only arms when a broker is stored; nothing arms here
    let t0 = Instant::now();
    for i in 0..50u32 {
        let events = supervisor.tick(t0 + TICK * i, true).await;
        assert!(events.is_empty());
    }

    assert_eq!(supervisor.phase(), Phase::Idle);
    assert_eq!(client.connect_calls(), 0);
}

/// A portal submission activates the configuration and the first connect
/// attempt happens within one tick of arming.
#[tokio::test]
async fn portal_submission_arms_and_connects_first_tick() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join("broker.json"));
    let mut config = BrokerConfig::default();

    let armed = apply_submission(
        &mut config,
        &store,
        &PortalSubmission {
            broker_address: "10.0.0.5".to_string(),
            broker_port: "1883".to_string(),
            ..Default::default()
        },
    );
    assert!(armed);
    assert!(config.has_stored_broker);

    let client = MockClient::new();
    client.script_connect([true]);
    let mut supervisor = supervisor_with(&client);

    let t0 = Instant::now();
    supervisor.arm(&config, t0);
    assert_eq!(supervisor.phase(), Phase::Connecting);

    let events = supervisor.tick(t0, true).await;

    assert_eq!(client.connect_calls(), 1);
    assert!(events.contains(&SupervisorEvent::Recovered));
    assert_eq!(supervisor.phase(), Phase::Connected);

    // the announce ran: command subscription plus liveness publish
    assert_eq!(client.subscribed(), vec![topics::command("garden-node")]);
    let published = client.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, topics::status("garden-node"));

    // connect used the captured parameters
    let seen = client.connects_seen();
    assert_eq!(seen[0].host, "10.0.0.5");
    assert_eq!(seen[0].port, 1883);
}

/// Three straight failures widen the cadence to a minute; the next burst's
/// first attempt succeeds and resets streak and cadence.
#[tokio::test]
async fn three_failures_widen_then_recover() {
    let client = MockClient::new();
    client.script_connect([false, false, false, true]);
    let mut supervisor = supervisor_with(&client);

    let t0 = Instant::now();
    supervisor.arm(&stored_config(), t0);

    // attempt 1 fails immediately
    let events = supervisor.tick(t0, true).await;
    assert!(matches!(
        events[0],
        SupervisorEvent::AttemptFailed { .. }
    ));
    assert_eq!(supervisor.state().failure_streak, 1);
    assert_eq!(supervisor.phase(), Phase::Backoff);

    // attempts 2 and 3 follow at the burst cadence
    supervisor.tick(t0 + BURST, true).await;
    assert_eq!(supervisor.state().failure_streak, 2);

    let events = supervisor.tick(t0 + BURST * 2, true).await;
    assert!(events.contains(&SupervisorEvent::CadenceWidened));
    assert_eq!(supervisor.state().failure_streak, 3);
    assert_eq!(supervisor.state().retry_interval, WIDENED);
    assert_eq!(supervisor.phase(), Phase::Connecting);
    assert_eq!(client.connect_calls(), 3);

    // nothing happens while the widened interval runs down
    supervisor.tick(t0 + BURST * 2 + Duration::from_secs(30), true).await;
    assert_eq!(client.connect_calls(), 3);

    // the widened monitor opens a new burst whose first attempt succeeds
    let events = supervisor.tick(t0 + BURST * 2 + WIDENED, true).await;
    assert!(events.contains(&SupervisorEvent::Recovered));
    assert_eq!(client.connect_calls(), 4);
    assert_eq!(supervisor.state().failure_streak, 0);
    assert_eq!(supervisor.state().retry_interval, Duration::ZERO);
    assert_eq!(supervisor.phase(), Phase::Connected);
}

/// A link-layer outage produces no-op ticks: no connect calls, streak
/// untouched. The first tick after the link returns attempts a connect.
#[tokio::test]
async fn link_down_ticks_are_noops() {
    let client = MockClient::new();
    client.script_connect([true]);
    let mut supervisor = supervisor_with(&client);

    let t0 = Instant::now();
    supervisor.arm(&stored_config(), t0);

    // burst opens but the link is down for 10 firings
    let mut now = t0;
    for _ in 0..10 {
        supervisor.tick(now, false).await;
        now += BURST;
    }
    assert_eq!(client.connect_calls(), 0);
    assert_eq!(supervisor.state().failure_streak, 0);
    assert_eq!(supervisor.phase(), Phase::Backoff);

    // link returns: next firing connects
    let events = supervisor.tick(now, true).await;
    assert!(events.contains(&SupervisorEvent::Recovered));
    assert_eq!(client.connect_calls(), 1);
    assert_eq!(supervisor.phase(), Phase::Connected);
}

/// Only the first two no-op firings of a burst are surfaced; a long outage
/// goes quiet instead of flooding the log.
#[tokio::test]
async fn link_down_reporting_is_throttled() {
    let client = MockClient::new();
    let mut supervisor = supervisor_with(&client);

    let t0 = Instant::now();
    supervisor.arm(&stored_config(), t0);

    let mut reported = 0;
    let mut now = t0;
    for _ in 0..10 {
        let events = supervisor.tick(now, false).await;
        reported += events
            .iter()
            .filter(|e| **e == SupervisorEvent::LinkDown)
            .count();
        now += BURST;
    }
    assert_eq!(reported, 2);
}

/// While connected, every monitor tick pumps the protocol loop; a dropped
/// session triggers a fresh burst on the next tick.
#[tokio::test]
async fn steady_state_services_and_redetects_drop() {
    let client = MockClient::new();
    client.script_connect([true, true]);
    let mut supervisor = supervisor_with(&client);

    let t0 = Instant::now();
    supervisor.arm(&stored_config(), t0);
    supervisor.tick(t0, true).await;
    assert_eq!(supervisor.phase(), Phase::Connected);

    // tight cadence: every tick services the session
    for i in 1..=5u32 {
        supervisor.tick(t0 + TICK * i, true).await;
    }
    assert_eq!(client.service_calls(), 5);

    // the broker goes away; the next monitor tick opens a burst and
    // reconnects immediately
    client.drop_session();
    let events = supervisor.tick(t0 + TICK * 6, true).await;
    assert!(events.contains(&SupervisorEvent::Recovered));
    assert_eq!(client.connect_calls(), 2);
}

/// Disarming stops all timer activity until re-armed.
#[tokio::test]
async fn disarm_returns_to_idle() {
    let client = MockClient::new();
    client.script_connect([true]);
    let mut supervisor = supervisor_with(&client);

    let t0 = Instant::now();
    supervisor.arm(&stored_config(), t0);
    supervisor.tick(t0, true).await;
    assert_eq!(supervisor.phase(), Phase::Connected);

    supervisor.disarm();
    assert_eq!(supervisor.phase(), Phase::Idle);

    for i in 1..=10u32 {
        let events = supervisor.tick(t0 + TICK * i, true).await;
        assert!(events.is_empty());
    }
    assert_eq!(client.connect_calls(), 1);
    assert_eq!(client.service_calls(), 0);
}

/// Re-arming after a configuration change resets the runtime state and
/// points the next attempt at the new broker.
#[tokio::test]
async fn rearm_uses_new_parameters() {
    let client = MockClient::new();
    client.script_connect([false, true]);
    let mut supervisor = supervisor_with(&client);

    let t0 = Instant::now();
    supervisor.arm(&stored_config(), t0);
    supervisor.tick(t0, true).await;
    assert_eq!(supervisor.state().failure_streak, 1);

    let mut updated = stored_config();
    updated.broker_address = "10.0.0.9".to_string();
    updated.broker_port = "8883".to_string();
    supervisor.arm(&updated, t0 + TICK);

    // state is re-initialized on arm
    assert_eq!(supervisor.state().failure_streak, 0);
    assert_eq!(supervisor.phase(), Phase::Connecting);

    supervisor.tick(t0 + TICK, true).await;
    let seen = client.connects_seen();
    assert_eq!(seen.last().unwrap().host, "10.0.0.9");
    assert_eq!(seen.last().unwrap().port, 8883);
}
