//! Uplink - connectivity supervisor for network-attached embedded devices
//!
//! This crate keeps a small device online: it brings the device onto a WiFi
//! network (self-provisioning through a captive portal when no credentials
//! exist), persists the broker connection parameters, and then maintains a
//! resilient session with an MQTT broker, retrying with bounded backoff
//! whenever the session drops.
//!
//! # Overview
//!
//! - [`supervisor`] - the retry/backoff state machine that owns the broker
//!   session (the core of the crate)
//! - [`provisioning`] - captive-portal integration and the submission queue
//! - [`store`] - the persisted broker record and its storage adapter
//! - [`transport`] - the messaging-client abstraction and its MQTT adapter
//! - [`device`] - network link, status LED, and reset-button adapters
//! - [`runtime`] - the cooperative main loop tying everything together
//!
//! All timing-sensitive logic lives behind pure decision functions in
//! [`supervisor::policy`], so the full retry behavior is unit-testable
//! without a broker or a clock.

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod provisioning;
pub mod runtime;
pub mod store;
pub mod supervisor;
pub mod testing;
pub mod transport;

pub use config::Settings;
pub use error::{UplinkError, UplinkResult};
pub use runtime::{Exit, Runtime};
pub use store::{BrokerConfig, ConfigStore};
pub use supervisor::policy::{Phase, RetryPolicy, SupervisorState};
pub use supervisor::{Supervisor, SupervisorEvent};
pub use transport::{ClientError, ClientStatus, ConnectOptions, MessagingClient};
