//! Provisioning flow
//!
//! The captive portal itself is a collaborator behind the
//! [`ProvisioningPortal`] trait; submissions arrive as [`PortalEvent`]s on an
//! mpsc channel that the main loop drains between ticks, so configuration
//! changes are applied at a well-defined point rather than from an arbitrary
//! callback. Applying a submission truncates the free-form fields to their
//! stored bounds, derives whether a broker is now configured, and persists
//! the record.

use crate::store::{BrokerConfig, ConfigStore, MAX_ADDRESS_LEN, MAX_CREDENTIAL_LEN, MAX_PORT_LEN};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

pub mod portal;

/// Free-form fields captured by the portal form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalSubmission {
    pub wifi_ssid: String,
    pub wifi_psk: String,
    pub broker_address: String,
    pub broker_port: String,
    pub broker_user: String,
    pub broker_pass: String,
}

/// Events emitted by the portal onto the provisioning queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalEvent {
    ConfigSubmitted(PortalSubmission),
}

/// Portal lifecycle errors
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("invalid portal listen address '{addr}'")]
    InvalidListenAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind provisioning portal: {0}")]
    Bind(#[from] warp::Error),
}

/// The credential-capture surface. Implementations must never block the
/// caller: `open` spawns, submissions flow through the event channel.
#[async_trait]
pub trait ProvisioningPortal: Send {
    /// Start advertising the portal, pre-filling the form from `defaults`.
    /// Opening an already-open portal is a no-op.
    async fn open(&mut self, defaults: &BrokerConfig) -> Result<(), PortalError>;

    /// Stop the portal and release its listener
    async fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Bounds-checked copy of a form field into its stored representation
fn truncate_field(value: &str, max_chars: usize) -> String {
    value.trim().chars().take(max_chars).collect()
}

/// Apply a portal submission to the configuration: truncate, copy, derive
/// the broker flag, persist. Returns true when the supervisor must be
/// (re)armed with the new parameters - the only path that arms it from a
/// fresh configuration.
///
/// A persistence failure is logged and swallowed: the in-memory
/// configuration stays authoritative until the next reboot.
pub fn apply_submission(
    config: &mut BrokerConfig,
    store: &ConfigStore,
    submission: &PortalSubmission,
) -> bool {
    config.broker_address = truncate_field(&submission.broker_address, MAX_ADDRESS_LEN);
    config.broker_port = truncate_field(&submission.broker_port, MAX_PORT_LEN);
    config.broker_user = truncate_field(&submission.broker_user, MAX_CREDENTIAL_LEN);
    config.broker_pass = truncate_field(&submission.broker_pass, MAX_CREDENTIAL_LEN);
    config.has_stored_broker = !config.broker_address.is_empty();

    info!(
        broker = %config.broker_address,
        port = %config.broker_port,
        user = %config.broker_user,
        active = config.has_stored_broker,
        "portal parameters captured"
    );

    if let Err(err) = store.save(config) {
        error!("failed to persist captured parameters, continuing in memory: {err}");
    }

    config.has_stored_broker
}
