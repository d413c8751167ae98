//! Connection Manager
//!
//! Owns the lifecycle of a single logical broker connection: connect,
//! subscribe, publish, disconnect, and the connection state machine.
//! There is no retry loop in here; reconnection is orchestrated by the
//! forwarding engine so both endpoints' policies stay independent.

use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::EndpointConfig;

use super::event::EndpointRole;
use super::transport::{RelayError, Transport, TransportEvent};

/// Connection state of one endpoint.
///
/// `Disconnected --connect()--> Connecting --(ack)--> Connected
/// --(transport close)--> Disconnected`; the engine moves a lost
/// connection through `Reconnecting` while a retry timer is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Initial connect in progress
    Connecting,
    /// Connected and operational
    Connected,
    /// Connection lost, a reconnection attempt is pending
    Reconnecting,
}

/// Read-only snapshot of one endpoint's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointStatus {
    /// Whether the endpoint is currently connected
    pub connected: bool,
    /// Reconnection attempts since the last successful connect
    pub attempts: u32,
}

/// Manages one broker connection, independent of the other side
pub struct ConnectionManager {
    role: EndpointRole,
    config: EndpointConfig,
    transport: Box<dyn Transport>,
    state: ConnectionState,
    attempts: u32,
    /// Merged event stream shared with the engine; events are tagged
    /// with this manager's role
    events: mpsc::UnboundedSender<(EndpointRole, TransportEvent)>,
    pump: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(
        role: EndpointRole,
        config: EndpointConfig,
        transport: Box<dyn Transport>,
        events: mpsc::UnboundedSender<(EndpointRole, TransportEvent)>,
    ) -> Self {
        Self {
            role,
            config,
            transport,
            state: ConnectionState::Disconnected,
            attempts: 0,
            events,
            pump: None,
        }
    }

    pub fn role(&self) -> EndpointRole {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn status(&self) -> EndpointStatus {
        EndpointStatus {
            connected: self.state == ConnectionState::Connected,
            attempts: self.attempts,
        }
    }

    /// Establish the connection and negotiate the session.
    ///
    /// On success the state becomes `Connected`, the attempt counter
    /// resets, and the source role subscribes to its configured topic
    /// filters at QoS 1. On failure the state becomes `Disconnected`
    /// and the error is returned to the caller; there is no synchronous
    /// retry here.
    pub async fn connect(&mut self) -> Result<(), RelayError> {
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Connecting;
        }

        let connected = self.transport.connect(&self.config, self.role).await;
        let mut rx = match connected {
            Ok(rx) => rx,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        // Re-wire the session event stream into the engine's channel
        if let Some(old) = self.pump.take() {
            old.abort();
        }
        let events = self.events.clone();
        let role = self.role;
        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if events.send((role, event)).is_err() {
                    return;
                }
            }
        }));

        self.state = ConnectionState::Connected;
        self.attempts = 0;
        info!("Connected to {} broker: {}", self.role, self.config.address);

        if self.role == EndpointRole::Source {
            for filter in self.config.topics.clone() {
                match self.transport.subscribe(&filter, QoS::AtLeastOnce).await {
                    Ok(()) => debug!("Subscribed to topic: {}", filter),
                    Err(e) => error!("Failed to subscribe to topic {}: {}", filter, e),
                }
            }
        }

        Ok(())
    }

    /// Publish to the broker, failing immediately when not connected.
    ///
    /// No implicit queuing and no blocking wait: the relay's non-goal of
    /// buffering across a connection gap is enforced right here.
    pub async fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retain: bool,
    ) -> Result<(), RelayError> {
        if self.state != ConnectionState::Connected {
            return Err(RelayError::NotConnected);
        }
        self.transport.publish(topic, payload, qos, retain).await
    }

    /// Graceful close when connected, no-op otherwise.
    pub async fn disconnect(&mut self) -> Result<(), RelayError> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }
        self.state = ConnectionState::Disconnected;
        self.transport.disconnect().await
    }

    /// Record that the transport closed underneath us.
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Record that a reconnection attempt has been scheduled.
    ///
    /// The caller checks the policy cap first; the counter never passes
    /// `max_attempts` without a successful connect resetting it.
    pub fn begin_reconnect(&mut self) {
        self.state = ConnectionState::Reconnecting;
        self.attempts += 1;
    }
}
