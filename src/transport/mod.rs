//! Messaging transport layer
//!
//! The supervisor talks to the broker exclusively through the
//! [`MessagingClient`] trait so the retry state machine can be exercised
//! against a scripted client in tests. The production implementation lives
//! in [`mqtt`].

use crate::store::BrokerConfig;
use thiserror::Error;

pub mod mqtt;

/// Diagnostic status of the messaging client.
///
/// The numeric codes follow the connection-state convention of the embedded
/// MQTT client libraries this device family ships with (-4..5). They are
/// surfaced in logs only and never steer the retry policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientStatus {
    ConnectionTimeout,
    ConnectionLost,
    ConnectFailed,
    #[default]
    Disconnected,
    Connected,
    BadProtocol,
    BadClientId,
    Unavailable,
    BadCredentials,
    Unauthorized,
}

impl ClientStatus {
    pub fn code(self) -> i8 {
        match self {
            ClientStatus::ConnectionTimeout => -4,
            ClientStatus::ConnectionLost => -3,
            ClientStatus::ConnectFailed => -2,
            ClientStatus::Disconnected => -1,
            ClientStatus::Connected => 0,
            ClientStatus::BadProtocol => 1,
            ClientStatus::BadClientId => 2,
            ClientStatus::Unavailable => 3,
            ClientStatus::BadCredentials => 4,
            ClientStatus::Unauthorized => 5,
        }
    }
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClientStatus::ConnectionTimeout => "connection timeout",
            ClientStatus::ConnectionLost => "connection lost",
            ClientStatus::ConnectFailed => "connect failed",
            ClientStatus::Disconnected => "disconnected",
            ClientStatus::Connected => "connected",
            ClientStatus::BadProtocol => "bad protocol version",
            ClientStatus::BadClientId => "bad client id",
            ClientStatus::Unavailable => "broker unavailable",
            ClientStatus::BadCredentials => "bad credentials",
            ClientStatus::Unauthorized => "unauthorized",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// Messaging client errors, carrying the diagnostic status code
#[derive(Debug, Error)]
#[error("{status}: {detail}")]
pub struct ClientError {
    pub status: ClientStatus,
    pub detail: String,
}

impl ClientError {
    pub fn new(status: ClientStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

/// Parameters for one broker connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectOptions {
    /// Derive connect parameters from the persisted record. Empty credential
    /// fields mean anonymous access.
    pub fn from_config(device: &str, config: &BrokerConfig) -> Self {
        let optional = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };
        Self {
            client_id: device.to_string(),
            host: config.broker_address.clone(),
            port: config.port(),
            username: optional(&config.broker_user),
            password: optional(&config.broker_pass),
        }
    }
}

/// Abstraction over the broker session.
///
/// `connect` runs to completion (success or the client library's own
/// timeout); `service` pumps the protocol loop for at most a short budget so
/// a cooperative tick never stalls.
#[async_trait::async_trait]
pub trait MessagingClient: Send {
    /// Attempt a fresh broker connection, replacing any previous session
    async fn connect(&mut self, opts: &ConnectOptions) -> Result<(), ClientError>;

    /// Whether the client currently holds a live session
    fn connected(&self) -> bool;

    /// Pump the protocol loop: keepalive, inbound reads, acks
    async fn service(&mut self);

    /// Publish a message at-least-once
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ClientError>;

    /// Subscribe to a topic at-least-once
    async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError>;

    /// Last observed diagnostic status
    fn status(&self) -> ClientStatus;
}

/// Fixed topic identifiers exchanged after each successful connect
pub mod topics {
    /// Inbound command subscription for a device
    pub fn command(device: &str) -> String {
        format!("devices/{device}/command")
    }

    /// Outbound liveness topic for a device
    pub fn status(device: &str) -> String {
        format!("devices/{device}/status")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ClientStatus::ConnectionTimeout.code(), -4);
        assert_eq!(ClientStatus::Disconnected.code(), -1);
        assert_eq!(ClientStatus::Connected.code(), 0);
        assert_eq!(ClientStatus::Unauthorized.code(), 5);
    }

    #[test]
    fn test_status_display_includes_code() {
        let rendered = ClientStatus::ConnectFailed.to_string();
        assert!(rendered.contains("-2"), "got: {rendered}");
    }

    #[test]
    fn test_topics() {
        assert_eq!(topics::command("garden-node"), "devices/garden-node/command");
        assert_eq!(topics::status("garden-node"), "devices/garden-node/status");
    }

    #[test]
    fn test_connect_options_from_config() {
        let config = BrokerConfig {
            broker_address: "10.0.0.5".to_string(),
            broker_port: "8883".to_string(),
            broker_user: "sensor".to_string(),
            broker_pass: String::new(),
            has_stored_broker: true,
        };
        let opts = ConnectOptions::from_config("garden-node", &config);
        assert_eq!(opts.client_id, "garden-node");
        assert_eq!(opts.host, "10.0.0.5");
        assert_eq!(opts.port, 8883);
        assert_eq!(opts.username.as_deref(), Some("sensor"));
        assert_eq!(opts.password, None);
    }
}
