//! Forwarding Engine
//!
//! Composes the two connection managers and drives the relay pipeline:
//! source messages flow through the topic route and the optional payload
//! transform into target publishes, preserving QoS and retain. The engine
//! also owns reconnection orchestration, with an independent policy and
//! attempt counter per endpoint.
//!
//! The engine runs as a single task. All relay state (connection states,
//! attempt counters) is touched only from that task, so no locking is
//! needed; suspension points are the async broker calls and the
//! reconnect timers, which post back into the engine's command channel.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::{Config, ReconnectConfig};
use crate::route::TopicRoute;

use super::event::{EndpointRole, RelayEvent, RelayedMessage};
use super::manager::{ConnectionManager, ConnectionState, EndpointStatus};
use super::transform::{validate_message, PayloadTransform};
use super::transport::{MqttTransport, RelayError, Transport, TransportEvent};

/// Read-only snapshot of the whole relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Whether the relay is running
    pub running: bool,
    /// Source endpoint state
    pub source: EndpointStatus,
    /// Target endpoint state
    pub target: EndpointStatus,
}

/// Drives the source-to-target relay and per-endpoint reconnection
pub struct ForwardingEngine {
    source: ConnectionManager,
    target: ConnectionManager,
    route: TopicRoute,
    transform: Option<PayloadTransform>,
    source_policy: ReconnectConfig,
    target_policy: ReconnectConfig,
    running: bool,
    events: mpsc::UnboundedSender<RelayEvent>,
    /// Merged per-endpoint transport events
    endpoint_rx: mpsc::UnboundedReceiver<(EndpointRole, TransportEvent)>,
    /// Expired reconnect timers post the endpoint role back here
    timer_tx: mpsc::UnboundedSender<EndpointRole>,
    timer_rx: mpsc::UnboundedReceiver<EndpointRole>,
}

impl ForwardingEngine {
    /// Build an engine over real MQTT connections.
    pub fn new(config: &Config, events: mpsc::UnboundedSender<RelayEvent>) -> Self {
        Self::with_transports(
            config,
            Box::new(MqttTransport::new()),
            Box::new(MqttTransport::new()),
            events,
        )
    }

    /// Build an engine over caller-supplied transports.
    pub fn with_transports(
        config: &Config,
        source_transport: Box<dyn Transport>,
        target_transport: Box<dyn Transport>,
        events: mpsc::UnboundedSender<RelayEvent>,
    ) -> Self {
        let (endpoint_tx, endpoint_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let source = ConnectionManager::new(
            EndpointRole::Source,
            config.source.clone(),
            source_transport,
            endpoint_tx.clone(),
        );
        let target = ConnectionManager::new(
            EndpointRole::Target,
            config.target.clone(),
            target_transport,
            endpoint_tx,
        );

        // Each endpoint gets its own policy instance so exhaustion on one
        // side never affects the other's cadence
        let source_policy = config
            .source
            .reconnect
            .clone()
            .unwrap_or_else(|| config.reconnect.clone());
        let target_policy = config
            .target
            .reconnect
            .clone()
            .unwrap_or_else(|| config.reconnect.clone());

        Self {
            source,
            target,
            route: TopicRoute::new(&config.route),
            transform: None,
            source_policy,
            target_policy,
            running: false,
            events,
            endpoint_rx,
            timer_tx,
            timer_rx,
        }
    }

    /// Install the payload transform hook (identity when never called).
    pub fn set_payload_transform(&mut self, transform: PayloadTransform) {
        self.transform = Some(transform);
    }

    /// Connect both endpoints and mark the relay running.
    ///
    /// Source connects first, then target; the target must be connectable
    /// before any relay begins. Either failure propagates and leaves the
    /// engine not-running.
    pub async fn start(&mut self) -> Result<(), RelayError> {
        info!("Starting MQTT relay...");

        let source_connected = self.source.connect().await;
        if let Err(e) = source_connected {
            self.emit(RelayEvent::SourceError(e.to_string()));
            return Err(e);
        }

        let target_connected = self.target.connect().await;
        if let Err(e) = target_connected {
            self.emit(RelayEvent::TargetError(e.to_string()));
            // Don't leave a half-started relay holding the source open
            let _ = self.source.disconnect().await;
            return Err(e);
        }

        self.running = true;
        info!("MQTT relay started");
        self.emit(RelayEvent::Started);
        Ok(())
    }

    /// Drive the relay until the shutdown signal fires, then stop.
    pub async fn run(
        &mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), RelayError> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                Some((role, event)) = self.endpoint_rx.recv() => {
                    self.handle_endpoint_event(role, event).await;
                }
                Some(role) = self.timer_rx.recv() => {
                    self.handle_reconnect(role).await;
                }
            }
        }
        self.stop().await
    }

    /// Stop the relay: suppress further reconnection scheduling and
    /// disconnect both endpoints concurrently.
    pub async fn stop(&mut self) -> Result<(), RelayError> {
        info!("Stopping MQTT relay...");
        self.running = false;

        let (source_result, target_result) =
            tokio::join!(self.source.disconnect(), self.target.disconnect());

        match source_result.and(target_result) {
            Ok(()) => {
                info!("MQTT relay stopped");
                self.emit(RelayEvent::Stopped);
                Ok(())
            }
            Err(e) => {
                error!("Error stopping relay: {}", e);
                self.emit(RelayEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Read-only status snapshot, no side effects.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.running,
            source: self.source.status(),
            target: self.target.status(),
        }
    }

    pub(crate) async fn handle_endpoint_event(&mut self, role: EndpointRole, event: TransportEvent) {
        match event {
            TransportEvent::Message {
                topic,
                payload,
                qos,
                retain,
            } => {
                if role == EndpointRole::Source {
                    self.relay_message(RelayedMessage {
                        topic,
                        payload,
                        qos,
                        retain,
                    })
                    .await;
                } else {
                    // The target side carries no subscriptions
                    debug!("Ignoring unexpected message from target broker: {}", topic);
                }
            }
            TransportEvent::Closed { reason } => self.handle_closed(role, reason),
        }
    }

    /// Relay one source message to the target.
    ///
    /// Failure here is always per-message: the message is dropped, an
    /// event is emitted and the pipeline keeps running.
    pub(crate) async fn relay_message(&mut self, msg: RelayedMessage) {
        if let Err(e) = validate_message(&msg.topic) {
            error!("Error processing message: {}", e);
            self.emit(RelayEvent::ProcessingError {
                topic: msg.topic,
                error: e.to_string(),
            });
            return;
        }

        if self.target.state() != ConnectionState::Connected {
            warn!("Target client not connected, message dropped");
            self.emit(RelayEvent::MessageDropped { topic: msg.topic });
            return;
        }

        let target_topic = self.route.resolve(&msg.topic);
        let payload = match &self.transform {
            Some(transform) => match transform(&msg.topic, &msg.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    let error = RelayError::Transform(e.to_string());
                    error!("Error processing message: {}", error);
                    self.emit(RelayEvent::ProcessingError {
                        topic: msg.topic,
                        error: error.to_string(),
                    });
                    return;
                }
            },
            None => msg.payload.clone(),
        };

        let published = self
            .target
            .publish(&target_topic, payload, msg.qos, msg.retain)
            .await;
        match published {
            Ok(()) => {
                debug!("{} -> {}", msg.topic, target_topic);
                self.emit(RelayEvent::MessageForwarded {
                    original_topic: msg.topic,
                    target_topic,
                });
            }
            Err(e) => {
                error!(
                    "Failed to forward message to topic {}: {}",
                    target_topic, e
                );
                self.emit(RelayEvent::ForwardError {
                    topic: msg.topic,
                    error: e.to_string(),
                });
            }
        }
    }

    pub(crate) fn handle_closed(&mut self, role: EndpointRole, reason: Option<String>) {
        match reason {
            Some(reason) => warn!("{} connection closed: {}", role, reason),
            None => info!("{} connection closed", role),
        }
        self.manager_mut(role).mark_disconnected();

        if !self.running {
            debug!("Relay not running, no reconnection for {}", role);
            return;
        }
        self.schedule_reconnect(role);
    }

    /// Arm one reconnect timer for an endpoint, or declare it exhausted.
    pub(crate) fn schedule_reconnect(&mut self, role: EndpointRole) {
        let policy = self.policy(role).clone();
        let attempts = self.manager(role).attempts();
        if attempts >= policy.max_attempts {
            error!("Max reconnection attempts reached for {} client", role);
            self.emit(RelayEvent::ReconnectExhausted { endpoint: role });
            return;
        }

        self.manager_mut(role).begin_reconnect();
        info!(
            "Attempting to reconnect {} client ({}/{})",
            role,
            self.manager(role).attempts(),
            policy.max_attempts
        );

        let timers = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(policy.delay).await;
            let _ = timers.send(role);
        });
    }

    /// A reconnect timer fired: try to connect the endpoint once.
    pub(crate) async fn handle_reconnect(&mut self, role: EndpointRole) {
        if !self.running {
            debug!("Reconnect timer for {} fired after stop, ignoring", role);
            return;
        }
        if self.manager(role).state() == ConnectionState::Connected {
            return;
        }

        let connected = self.manager_mut(role).connect().await;
        match connected {
            Ok(()) => {
                self.emit(RelayEvent::Reconnected { endpoint: role });
            }
            Err(e) => {
                error!("Reconnection failed for {}: {}", role, e);
                self.emit(match role {
                    EndpointRole::Source => RelayEvent::SourceError(e.to_string()),
                    EndpointRole::Target => RelayEvent::TargetError(e.to_string()),
                });
                self.schedule_reconnect(role);
            }
        }
    }

    fn manager(&self, role: EndpointRole) -> &ConnectionManager {
        match role {
            EndpointRole::Source => &self.source,
            EndpointRole::Target => &self.target,
        }
    }

    fn manager_mut(&mut self, role: EndpointRole) -> &mut ConnectionManager {
        match role {
            EndpointRole::Source => &mut self.source,
            EndpointRole::Target => &mut self.target,
        }
    }

    fn policy(&self, role: EndpointRole) -> &ReconnectConfig {
        match role {
            EndpointRole::Source => &self.source_policy,
            EndpointRole::Target => &self.target_policy,
        }
    }

    fn emit(&self, event: RelayEvent) {
        // The collaborator hanging up must not take the relay down
        let _ = self.events.send(event);
    }
}
