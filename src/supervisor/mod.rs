//! Connectivity supervisor
//!
//! Keeps the broker session alive for as long as a broker is configured:
//! monitors the session on a tight cadence, opens a burst of reconnect
//! attempts when it drops, and widens the cadence once a burst is exhausted
//! so a broker that stays down is probed gently. The decision logic is pure
//! and lives in [`policy`]; this module owns the two due-times ("is it time
//! to evaluate this phase") and the messaging client.
//!
//! The supervisor is driven by [`Supervisor::tick`] from the cooperative
//! main loop. A tick never blocks beyond one bounded client call, and all
//! state transitions are observable through the returned events.

pub mod policy;

use crate::store::BrokerConfig;
use crate::transport::{topics, ClientStatus, ConnectOptions, MessagingClient};
use policy::{AttemptGate, AttemptOutcome, MonitorVerdict, Phase, RetryPolicy, SupervisorState};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Transition notifications consumed by the runtime (the status indicator
/// reacts to these; it never decides anything on its own)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Session re-established and announced
    Recovered,
    /// One connect attempt failed, carrying the client's diagnostic status
    AttemptFailed { status: ClientStatus },
    /// A burst was exhausted and the monitor cadence widened
    CadenceWidened,
    /// A reconnect tick found the link layer down
    LinkDown,
}

/// Timer-driven retry state machine owning the broker session
pub struct Supervisor<C: MessagingClient> {
    client: C,
    policy: RetryPolicy,
    state: SupervisorState,
    opts: Option<ConnectOptions>,
    device: String,
    command_topic: String,
    status_topic: String,
    /// Next connect-monitor evaluation; None while a burst is active
    monitor_due: Option<Instant>,
    /// Next reconnect attempt; None outside a burst
    retry_due: Option<Instant>,
    /// Reconnect firings of the current burst that found the link down
    noop_ticks: u32,
}

impl<C: MessagingClient> Supervisor<C> {
    pub fn new(client: C, policy: RetryPolicy, device: &str) -> Self {
        Self {
            client,
            policy,
            state: SupervisorState::idle(),
            opts: None,
            device: device.to_string(),
            command_topic: topics::command(device),
            status_topic: topics::status(device),
            monitor_due: None,
            retry_due: None,
            noop_ticks: 0,
        }
    }

    /// Arm the supervisor with broker parameters. State is re-initialized
    /// and the first evaluation is due on the next tick.
    pub fn arm(&mut self, config: &BrokerConfig, now: Instant) {
        self.opts = Some(ConnectOptions::from_config(&self.device, config));
        self.state = SupervisorState::armed();
        self.monitor_due = Some(now);
        self.retry_due = None;
        info!(
            broker = %config.broker_address,
            port = config.port(),
            "supervisor armed"
        );
    }

    /// Drop back to idle; no further timer activity until re-armed
    pub fn disarm(&mut self) {
        self.opts = None;
        self.state = SupervisorState::idle();
        self.monitor_due = None;
        self.retry_due = None;
        info!("supervisor disarmed");
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Evaluate whichever phase is due at `now`. `link_up` is the link-layer
    /// association state, sampled by the caller this tick.
    pub async fn tick(&mut self, now: Instant, link_up: bool) -> Vec<SupervisorEvent> {
        let mut events = Vec::new();

        if self.state.phase == Phase::Idle {
            return events;
        }

        if self.monitor_due.is_some_and(|due| now >= due) {
            match policy::monitor_verdict(self.client.connected()) {
                MonitorVerdict::Service => {
                    self.state.phase = Phase::Connected;
                    self.client.service().await;
                    self.monitor_due = Some(now + self.state.retry_interval);
                }
                MonitorVerdict::StartBurst => {
                    debug!("session down, opening reconnect burst");
                    policy::begin_burst(&mut self.state);
                    self.monitor_due = None;
                    self.noop_ticks = 0;
                    // first attempt fires immediately, below in this tick
                    self.retry_due = Some(now);
                }
            }
        }

        if self.state.phase == Phase::Backoff && self.retry_due.is_some_and(|due| now >= due) {
            match policy::attempt_gate(link_up, self.noop_ticks) {
                AttemptGate::LinkDown { log } => {
                    if log {
                        warn!("link layer down, holding reconnect attempts");
                        events.push(SupervisorEvent::LinkDown);
                    }
                    self.noop_ticks += 1;
                    self.retry_due = Some(now + self.policy.burst_interval);
                }
                AttemptGate::Connect => {
                    events.push(self.attempt_connect(now).await);
                }
            }
        }

        events
    }

    async fn attempt_connect(&mut self, now: Instant) -> SupervisorEvent {
        let Some(opts) = self.opts.clone() else {
            // armed phases always carry options; treat the gap as a disarm
            self.disarm();
            return SupervisorEvent::AttemptFailed {
                status: ClientStatus::Disconnected,
            };
        };

        debug!(host = %opts.host, port = opts.port, "connecting to broker");
        let result = self.client.connect(&opts).await;
        let success = result.is_ok();
        if let Err(err) = &result {
            info!(
                code = err.status.code(),
                streak = self.state.failure_streak + 1,
                "broker connect failed: {err}"
            );
        }

        match policy::register_attempt(&mut self.state, success, &self.policy) {
            AttemptOutcome::Recovered => {
                self.retry_due = None;
                self.monitor_due = Some(now + self.state.retry_interval);
                self.announce().await;
                SupervisorEvent::Recovered
            }
            AttemptOutcome::RetryScheduled { streak } => {
                self.retry_due = Some(now + self.policy.burst_interval);
                debug!(streak, "retrying at burst cadence");
                SupervisorEvent::AttemptFailed {
                    status: self.client.status(),
                }
            }
            AttemptOutcome::CadenceWidened => {
                self.retry_due = None;
                self.monitor_due = Some(now + self.policy.widened_interval);
                warn!(
                    interval_ms = self.policy.widened_interval.as_millis() as u64,
                    "burst exhausted, widening reconnect cadence"
                );
                SupervisorEvent::CadenceWidened
            }
        }
    }

    /// Post-connect announce: subscribe to the command topic and publish a
    /// liveness message. Failures are diagnostics, never fatal.
    async fn announce(&mut self) {
        info!(device = %self.device, "broker session established");

        if let Err(err) = self.client.subscribe(&self.command_topic).await {
            warn!(topic = %self.command_topic, "subscribe failed: {err}");
        }

        let payload = liveness_payload(&self.device);
        if let Err(err) = self
            .client
            .publish(&self.status_topic, payload.as_bytes())
            .await
        {
            warn!(topic = %self.status_topic, "liveness publish failed: {err}");
        }
    }
}

fn liveness_payload(device: &str) -> String {
    serde_json::json!({
        "device": device,
        "status": "online",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
    .to_string()
}
