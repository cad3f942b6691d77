//! Cooperative runtime
//!
//! One loop services everything: the LED pattern, the reset watcher, the
//! provisioning queue, and the supervisor. All shared state lives in this
//! context object and is only ever touched between ticks, so there is
//! nothing to lock.

use crate::config::Settings;
use crate::device::{NetworkLink, ResetInput, ResetWatcher, StatusIndicator};
use crate::error::UplinkResult;
use crate::provisioning::{self, PortalEvent, ProvisioningPortal};
use crate::store::{BrokerConfig, ConfigStore};
use crate::supervisor::{Supervisor, SupervisorEvent};
use crate::transport::MessagingClient;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Configuration wiped; the process must restart
    FactoryReset,
}

/// Everything the main loop owns
pub struct Runtime<C: MessagingClient> {
    settings: Settings,
    store: ConfigStore,
    config: BrokerConfig,
    supervisor: Supervisor<C>,
    portal: Box<dyn ProvisioningPortal>,
    events: mpsc::Receiver<PortalEvent>,
    link: Box<dyn NetworkLink>,
    indicator: Box<dyn StatusIndicator>,
    button: Box<dyn ResetInput>,
    reset: ResetWatcher,
}

impl<C: MessagingClient> Runtime<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        store: ConfigStore,
        config: BrokerConfig,
        supervisor: Supervisor<C>,
        portal: Box<dyn ProvisioningPortal>,
        events: mpsc::Receiver<PortalEvent>,
        link: Box<dyn NetworkLink>,
        indicator: Box<dyn StatusIndicator>,
        button: Box<dyn ResetInput>,
    ) -> Self {
        let reset = ResetWatcher::new(settings.reset.hold());
        Self {
            settings,
            store,
            config,
            supervisor,
            portal,
            events,
            link,
            indicator,
            button,
            reset,
        }
    }

    /// Run until a factory reset is requested
    pub async fn run(&mut self) -> UplinkResult<Exit> {
        self.indicator.set_off();

        if self.config.has_stored_broker {
            self.supervisor.arm(&self.config, Instant::now());
        } else {
            info!("no broker stored, operating on wifi only");
        }

        // provision when nothing is stored yet or the device cannot get online
        if !self.config.has_stored_broker || !self.link.is_up() {
            self.portal.open(&self.config).await?;
        }

        let mut ticker = tokio::time::interval(self.settings.device.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let now = Instant::now();

            self.indicator.tick(now);

            if self.reset.tick(self.button.is_pressed(), now) {
                self.factory_reset().await;
                return Ok(Exit::FactoryReset);
            }

            while let Ok(event) = self.events.try_recv() {
                self.handle_portal_event(event);
            }

            let link_up = self.link.is_up();
            for event in self.supervisor.tick(now, link_up).await {
                self.react(event);
            }
        }
    }

    fn handle_portal_event(&mut self, event: PortalEvent) {
        match event {
            PortalEvent::ConfigSubmitted(submission) => {
                if !submission.wifi_ssid.is_empty() {
                    if let Err(err) = self.link.join(&submission.wifi_ssid, &submission.wifi_psk) {
                        warn!("wifi credential handoff failed: {err}");
                    }
                }

                let arm = provisioning::apply_submission(&mut self.config, &self.store, &submission);
                if arm {
                    self.supervisor.arm(&self.config, Instant::now());
                }
            }
        }
    }

    fn react(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Recovered => self.indicator.pulse(200, 200, 3),
            SupervisorEvent::AttemptFailed { status } => {
                debug!(code = status.code(), "connect attempt failed");
            }
            SupervisorEvent::CadenceWidened | SupervisorEvent::LinkDown => {}
        }
    }

    async fn factory_reset(&mut self) {
        warn!("factory reset requested");
        self.portal.close().await;
        perform_factory_reset(&self.store, self.link.as_ref(), self.indicator.as_mut());
    }
}

/// Wipe all persisted identity: the broker record and the WiFi credentials.
/// Irreversible and user-initiated; the caller restarts the process
/// afterwards. Wipe failures are logged and the restart proceeds anyway -
/// there is no better recovery than booting fresh.
pub fn perform_factory_reset(
    store: &ConfigStore,
    link: &dyn NetworkLink,
    indicator: &mut dyn StatusIndicator,
) {
    indicator.set_on();
    if let Err(err) = store.wipe() {
        error!("failed to wipe broker record: {err}");
    }
    if let Err(err) = link.forget_credentials() {
        error!("failed to clear wifi credentials: {err}");
    }
    info!("persisted identity wiped, restarting");
}
