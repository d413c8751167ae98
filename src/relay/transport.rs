//! Broker Transport
//!
//! Seam between the connection manager and the wire-level MQTT client
//! library. The production implementation drives a `rumqttc` client;
//! tests substitute a scripted transport.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::EndpointConfig;

use super::event::EndpointRole;

/// Error type for relay operations
#[derive(Debug)]
pub enum RelayError {
    /// Connection to the broker failed or was lost
    ConnectionLost(String),
    /// Broker rejected the connection
    Rejected(String),
    /// Operation timed out
    Timeout,
    /// Publish attempted while not connected
    NotConnected,
    /// Message failed validation
    InvalidMessage(String),
    /// Payload transform hook failed
    Transform(String),
    /// Other error
    Other(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            RelayError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            RelayError::Timeout => write!(f, "Operation timed out"),
            RelayError::NotConnected => write!(f, "Client not connected"),
            RelayError::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            RelayError::Transform(msg) => write!(f, "Transform failed: {}", msg),
            RelayError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

/// Events a live connection pushes back to its owner
#[derive(Debug)]
pub enum TransportEvent {
    /// A subscribed message arrived from the broker
    Message {
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
    },
    /// The connection closed or went offline
    Closed { reason: Option<String> },
}

/// Wire-level broker connection.
///
/// One instance backs one connection manager. `connect` owns the full
/// handshake (transport connect plus CONNACK) and hands back the event
/// stream for the established session; the other operations act on that
/// session. Implemented by [`MqttTransport`] in production.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection and complete the MQTT handshake.
    ///
    /// On success returns the receiver for this session's events. The
    /// stream ends with a single [`TransportEvent::Closed`] when the
    /// connection is lost.
    async fn connect(
        &mut self,
        config: &EndpointConfig,
        role: EndpointRole,
    ) -> Result<mpsc::Receiver<TransportEvent>, RelayError>;

    /// Subscribe to a topic filter on the connected broker.
    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), RelayError>;

    /// Publish a message to the connected broker.
    async fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retain: bool,
    ) -> Result<(), RelayError>;

    /// Close the connection gracefully.
    async fn disconnect(&mut self) -> Result<(), RelayError>;
}

/// Production transport over the `rumqttc` MQTT client
pub struct MqttTransport {
    client: Option<AsyncClient>,
    driver: Option<JoinHandle<()>>,
}

impl MqttTransport {
    pub fn new() -> Self {
        Self {
            client: None,
            driver: None,
        }
    }
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(
        &mut self,
        config: &EndpointConfig,
        role: EndpointRole,
    ) -> Result<mpsc::Receiver<TransportEvent>, RelayError> {
        // A stale session from a previous attempt is dead by definition
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.client = None;

        let (host, port) = config.parse_address();
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("mqrelay-{}-{}", role, std::process::id()));

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(config.keepalive);
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);

        // Drive the event loop until the broker acks the session
        let deadline = tokio::time::Instant::now() + config.connect_timeout;
        loop {
            let event = tokio::time::timeout_at(deadline, eventloop.poll())
                .await
                .map_err(|_| RelayError::Timeout)?
                .map_err(|e| RelayError::ConnectionLost(e.to_string()))?;

            if let Event::Incoming(Packet::ConnAck(ack)) = event {
                if ack.code != ConnectReturnCode::Success {
                    return Err(RelayError::Rejected(format!("{:?}", ack.code)));
                }
                debug!(
                    "{} broker acked connect (session_present={})",
                    role, ack.session_present
                );
                break;
            }
        }

        let (tx, rx) = mpsc::channel(256);
        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let event = TransportEvent::Message {
                            topic: publish.topic,
                            payload: publish.payload,
                            qos: publish.qos,
                            retain: publish.retain,
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        let _ = tx
                            .send(TransportEvent::Closed {
                                reason: Some("server disconnect".to_string()),
                            })
                            .await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx
                            .send(TransportEvent::Closed {
                                reason: Some(e.to_string()),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        self.client = Some(client);
        self.driver = Some(driver);
        Ok(rx)
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), RelayError> {
        let client = self.client.as_ref().ok_or(RelayError::NotConnected)?;
        client
            .subscribe(filter, qos)
            .await
            .map_err(|e| RelayError::ConnectionLost(e.to_string()))
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retain: bool,
    ) -> Result<(), RelayError> {
        let client = self.client.as_ref().ok_or(RelayError::NotConnected)?;
        client
            .publish(topic, qos, retain, payload.to_vec())
            .await
            .map_err(|e| RelayError::ConnectionLost(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), RelayError> {
        if let Some(client) = self.client.take() {
            client
                .disconnect()
                .await
                .map_err(|e| RelayError::ConnectionLost(e.to_string()))?;
        }
        // The driver keeps polling so the DISCONNECT actually goes out,
        // then winds down on its own when the socket closes.
        self.driver.take();
        Ok(())
    }
}
