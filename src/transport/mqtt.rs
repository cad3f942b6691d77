//! MQTT implementation of the messaging client
//!
//! Wraps a rumqttc `AsyncClient`/`EventLoop` pair behind the
//! [`MessagingClient`] trait. The supervisor owns the retry cadence, so this
//! adapter performs exactly one connection attempt per `connect` call and
//! never reconnects on its own; a session loss is reported through
//! `connected()` and the diagnostic status.

use super::{ClientError, ClientStatus, ConnectOptions, MessagingClient};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Request channel capacity between client handle and event loop
const CHANNEL_CAPACITY: usize = 10;
/// Keepalive negotiated with the broker
const KEEP_ALIVE: Duration = Duration::from_secs(60);
/// Upper bound on one protocol-loop pump, so a tick never stalls the
/// cooperative scheduler
const SERVICE_BUDGET: Duration = Duration::from_millis(50);

/// rumqttc-backed broker session
#[derive(Default)]
pub struct MqttSessionClient {
    client: Option<AsyncClient>,
    event_loop: Option<EventLoop>,
    connected: bool,
    status: ClientStatus,
}

impl MqttSessionClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn drop_session(&mut self) {
        self.client = None;
        self.event_loop = None;
        self.connected = false;
    }
}

fn connack_status(code: ConnectReturnCode) -> ClientStatus {
    match code {
        ConnectReturnCode::Success => ClientStatus::Connected,
        ConnectReturnCode::RefusedProtocolVersion => ClientStatus::BadProtocol,
        ConnectReturnCode::BadClientId => ClientStatus::BadClientId,
        ConnectReturnCode::ServiceUnavailable => ClientStatus::Unavailable,
        ConnectReturnCode::BadUserNamePassword => ClientStatus::BadCredentials,
        ConnectReturnCode::NotAuthorized => ClientStatus::Unauthorized,
    }
}

fn connect_error_status(err: &ConnectionError) -> ClientStatus {
    match err {
        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => {
            ClientStatus::ConnectionTimeout
        }
        ConnectionError::ConnectionRefused(code) => connack_status(*code),
        _ => ClientStatus::ConnectFailed,
    }
}

#[async_trait]
impl MessagingClient for MqttSessionClient {
    async fn connect(&mut self, opts: &ConnectOptions) -> Result<(), ClientError> {
        self.drop_session();

        let mut options = MqttOptions::new(&opts.client_id, &opts.host, opts.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(username) = &opts.username {
            options.set_credentials(username, opts.password.clone().unwrap_or_default());
        }

        let (client, mut event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        // Drive the event loop until the broker answers the CONNECT. The
        // wait is bounded by the client library's own network timeout.
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        self.client = Some(client);
                        self.event_loop = Some(event_loop);
                        self.connected = true;
                        self.status = ClientStatus::Connected;
                        return Ok(());
                    }
                    let status = connack_status(ack.code);
                    self.status = status;
                    return Err(ClientError::new(
                        status,
                        format!("broker refused connection: {:?}", ack.code),
                    ));
                }
                Ok(_) => continue,
                Err(err) => {
                    let status = connect_error_status(&err);
                    self.status = status;
                    return Err(ClientError::new(status, err.to_string()));
                }
            }
        }
    }

    fn connected(&self) -> bool {
        self.connected
    }

    async fn service(&mut self) {
        let Some(event_loop) = self.event_loop.as_mut() else {
            return;
        };

        match timeout(SERVICE_BUDGET, event_loop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                // Payload handling belongs to the application layer; the
                // supervisor only keeps the session alive.
                debug!(
                    topic = %publish.topic,
                    len = publish.payload.len(),
                    "inbound message"
                );
            }
            Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                warn!("broker closed the session");
                self.status = ClientStatus::Disconnected;
                self.drop_session();
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "broker session lost");
                self.status = ClientStatus::ConnectionLost;
                self.drop_session();
            }
            // No event within the servicing budget; try again next tick.
            Err(_) => {}
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ClientError> {
        let Some(client) = self.client.as_ref() else {
            return Err(ClientError::new(ClientStatus::Disconnected, "no session"));
        };
        client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(|err| ClientError::new(ClientStatus::Disconnected, err.to_string()))
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        let Some(client) = self.client.as_ref() else {
            return Err(ClientError::new(ClientStatus::Disconnected, "no session"));
        };
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|err| ClientError::new(ClientStatus::Disconnected, err.to_string()))
    }

    fn status(&self) -> ClientStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connack_status_mapping() {
        assert_eq!(
            connack_status(ConnectReturnCode::Success),
            ClientStatus::Connected
        );
        assert_eq!(
            connack_status(ConnectReturnCode::BadUserNamePassword),
            ClientStatus::BadCredentials
        );
        assert_eq!(
            connack_status(ConnectReturnCode::ServiceUnavailable),
            ClientStatus::Unavailable
        );
    }

    #[test]
    fn test_fresh_client_is_disconnected() {
        let client = MqttSessionClient::new();
        assert!(!client.connected());
        assert_eq!(client.status(), ClientStatus::Disconnected);
    }

    #[test]
    fn test_publish_without_session_fails() {
        let mut client = MqttSessionClient::new();
        let result = tokio_test::block_on(client.publish("devices/x/status", b"hello"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().status, ClientStatus::Disconnected);
    }

    #[test]
    fn test_service_without_session_is_noop() {
        let mut client = MqttSessionClient::new();
        tokio_test::block_on(client.service());
        assert!(!client.connected());
    }
}
