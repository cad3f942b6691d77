//! Mock collaborators for testing
//!
//! Provides mock MessagingClient, NetworkLink, StatusIndicator, ResetInput,
//! and ProvisioningPortal implementations so the supervisor and runtime can
//! be exercised without a broker, a WiFi interface, or real hardware. All
//! mocks hand out cloneable handles over shared interior state, so a test
//! can keep inspecting a mock after moving it into the system under test.

use crate::device::{LinkError, NetworkLink, ResetInput, StatusIndicator};
use crate::provisioning::{PortalError, ProvisioningPortal};
use crate::store::BrokerConfig;
use crate::transport::{ClientError, ClientStatus, ConnectOptions, MessagingClient};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Default)]
struct MockClientState {
    connected: bool,
    status: ClientStatus,
    connect_script: VecDeque<bool>,
    connect_calls: u32,
    service_calls: u32,
    connects_seen: Vec<ConnectOptions>,
    published: Vec<(String, Vec<u8>)>,
    subscribed: Vec<String>,
}

/// Scripted messaging client. Each `connect` call consumes the next scripted
/// outcome; an exhausted script fails the attempt.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockClientState>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockClientState> {
        self.state.lock().unwrap()
    }

    /// Queue outcomes for upcoming connect attempts
    pub fn script_connect(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.lock().connect_script.extend(outcomes);
    }

    /// Simulate the session dropping out from under the supervisor
    pub fn drop_session(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.status = ClientStatus::ConnectionLost;
    }

    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    pub fn service_calls(&self) -> u32 {
        self.lock().service_calls
    }

    pub fn connects_seen(&self) -> Vec<ConnectOptions> {
        self.lock().connects_seen.clone()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().published.clone()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.lock().subscribed.clone()
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn connect(&mut self, opts: &ConnectOptions) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.connect_calls += 1;
        state.connects_seen.push(opts.clone());

        if state.connect_script.pop_front().unwrap_or(false) {
            state.connected = true;
            state.status = ClientStatus::Connected;
            Ok(())
        } else {
            state.connected = false;
            state.status = ClientStatus::ConnectFailed;
            Err(ClientError::new(
                ClientStatus::ConnectFailed,
                "scripted failure",
            ))
        }
    }

    fn connected(&self) -> bool {
        self.lock().connected
    }

    async fn service(&mut self) {
        self.lock().service_calls += 1;
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ClientError> {
        self.lock().published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.lock().subscribed.push(topic.to_string());
        Ok(())
    }

    fn status(&self) -> ClientStatus {
        self.lock().status
    }
}

/// Link with a switchable association state
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    up: Arc<AtomicBool>,
    joined: Arc<Mutex<Vec<(String, String)>>>,
    forgotten: Arc<AtomicBool>,
}

impl MockLink {
    pub fn new(up: bool) -> Self {
        let link = Self::default();
        link.set_up(up);
        link
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn joined(&self) -> Vec<(String, String)> {
        self.joined.lock().unwrap().clone()
    }

    pub fn credentials_forgotten(&self) -> bool {
        self.forgotten.load(Ordering::SeqCst)
    }
}

impl NetworkLink for MockLink {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    fn join(&self, ssid: &str, psk: &str) -> Result<(), LinkError> {
        self.joined
            .lock()
            .unwrap()
            .push((ssid.to_string(), psk.to_string()));
        Ok(())
    }

    fn forget_credentials(&self) -> Result<(), LinkError> {
        self.forgotten.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Indicator commands as observed by a mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCommand {
    On,
    Off,
    Pulse { on_ms: u64, off_ms: u64, count: u32 },
}

/// Records every command; ticks are ignored
#[derive(Debug, Clone, Default)]
pub struct MockIndicator {
    commands: Arc<Mutex<Vec<IndicatorCommand>>>,
}

impl MockIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<IndicatorCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl StatusIndicator for MockIndicator {
    fn set_on(&mut self) {
        self.commands.lock().unwrap().push(IndicatorCommand::On);
    }

    fn set_off(&mut self) {
        self.commands.lock().unwrap().push(IndicatorCommand::Off);
    }

    fn pulse(&mut self, on_ms: u64, off_ms: u64, count: u32) {
        self.commands.lock().unwrap().push(IndicatorCommand::Pulse {
            on_ms,
            off_ms,
            count,
        });
    }

    fn tick(&mut self, _now: Instant) {}
}

/// Button with a settable pressed state
#[derive(Debug, Clone, Default)]
pub struct MockButton {
    pressed: Arc<AtomicBool>,
}

impl MockButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pressed(&self, pressed: bool) {
        self.pressed.store(pressed, Ordering::SeqCst);
    }
}

impl ResetInput for MockButton {
    fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::SeqCst)
    }
}

/// Portal that only tracks its open state; tests inject submissions
/// directly onto the event channel
#[derive(Debug, Clone, Default)]
pub struct MockPortal {
    open: Arc<AtomicBool>,
}

impl MockPortal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProvisioningPortal for MockPortal {
    async fn open(&mut self, _defaults: &BrokerConfig) -> Result<(), PortalError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
