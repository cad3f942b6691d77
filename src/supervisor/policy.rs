//! Pure decision logic for the connectivity supervisor
//!
//! Everything timing-sensitive in the supervisor reduces to three pure
//! functions over [`SupervisorState`]: what the connect-monitor does when it
//! fires, whether a reconnect tick may attempt a connect at all, and how the
//! state advances after an attempt. The driver in the parent module only
//! decides *when* each phase is evaluated; it never decides *what* happens.
//!
//! The retry shape: a fresh disconnect opens a burst of quick attempts at
//! [`RetryPolicy::burst_interval`] spacing. Once [`RetryPolicy::max_burst_attempts`]
//! attempts in a row have failed, the burst ends and the connect-monitor
//! cadence widens to [`RetryPolicy::widened_interval`]; each widened monitor
//! firing that still finds the client disconnected opens a new burst. A
//! single transient failure therefore recovers within one burst interval,
//! while a broker that stays down costs at most one short burst per widened
//! interval.

use std::time::Duration;

/// Retry cadence parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Spacing between connect attempts inside a burst
    pub burst_interval: Duration,
    /// Connect-monitor cadence after a burst is exhausted
    pub widened_interval: Duration,
    /// Failed attempts that end a burst
    pub max_burst_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            burst_interval: Duration::from_millis(3000),
            widened_interval: Duration::from_millis(60_000),
            max_burst_attempts: 3,
        }
    }
}

/// Supervisor lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No broker configured, or not yet armed; no timer activity
    Idle,
    /// Armed, monitoring for the next evaluation
    Connecting,
    /// Holding a live session, servicing the protocol loop
    Connected,
    /// Inside a reconnect burst
    Backoff,
}

/// Runtime-only supervisor state. Owned exclusively by the supervisor and
/// re-initialized on every (re)arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorState {
    pub phase: Phase,
    /// Failed connect attempts within the current burst
    pub failure_streak: u32,
    /// Current connect-monitor cadence; zero means every scheduler tick
    pub retry_interval: Duration,
}

impl SupervisorState {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            failure_streak: 0,
            retry_interval: Duration::ZERO,
        }
    }

    pub fn armed() -> Self {
        Self {
            phase: Phase::Connecting,
            ..Self::idle()
        }
    }
}

/// What the connect-monitor does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Session is up: pump the protocol loop and keep monitoring
    Service,
    /// Session is down: suspend monitoring and open a reconnect burst
    StartBurst,
}

pub fn monitor_verdict(client_connected: bool) -> MonitorVerdict {
    if client_connected {
        MonitorVerdict::Service
    } else {
        MonitorVerdict::StartBurst
    }
}

/// Whether a reconnect tick may attempt a connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptGate {
    /// Link layer is up: go ahead
    Connect,
    /// Link layer is down: no-op tick, the failure streak does not advance.
    /// The condition is logged only early in a burst so a long outage does
    /// not flood the log.
    LinkDown { log: bool },
}

/// `noop_ticks` counts the reconnect firings of the current burst that found
/// the link down.
pub fn attempt_gate(link_up: bool, noop_ticks: u32) -> AttemptGate {
    if link_up {
        AttemptGate::Connect
    } else {
        AttemptGate::LinkDown {
            log: noop_ticks <= 1,
        }
    }
}

/// Mark the start of a reconnect burst. The streak counts attempts within
/// one burst, so it restarts here.
pub fn begin_burst(state: &mut SupervisorState) {
    state.phase = Phase::Backoff;
    state.failure_streak = 0;
}

/// How the state advances after a connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Session re-established; monitor resumes at the tight cadence
    Recovered,
    /// Attempt failed, burst continues at the burst interval
    RetryScheduled { streak: u32 },
    /// Burst exhausted; monitor resumes at the widened cadence
    CadenceWidened,
}

pub fn register_attempt(
    state: &mut SupervisorState,
    success: bool,
    policy: &RetryPolicy,
) -> AttemptOutcome {
    if success {
        state.failure_streak = 0;
        state.retry_interval = Duration::ZERO;
        state.phase = Phase::Connected;
        return AttemptOutcome::Recovered;
    }

    state.failure_streak = (state.failure_streak + 1).min(policy.max_burst_attempts);
    if state.failure_streak >= policy.max_burst_attempts {
        state.retry_interval = policy.widened_interval;
        state.phase = Phase::Connecting;
        AttemptOutcome::CadenceWidened
    } else {
        state.phase = Phase::Backoff;
        AttemptOutcome::RetryScheduled {
            streak: state.failure_streak,
        }
    }
}
