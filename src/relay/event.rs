//! Relay Events
//!
//! The engine's notification surface. Every failure path in the core
//! produces one of these observable events; the logging/monitoring
//! collaborator subscribes to the event channel and may depend on
//! nothing else.

use std::fmt;

use bytes::Bytes;
use rumqttc::QoS;

/// Which side of the relay an event or connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    /// Broker messages are consumed from
    Source,
    /// Broker messages are republished to
    Target,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Source => write!(f, "source"),
            EndpointRole::Target => write!(f, "target"),
        }
    }
}

/// A message as delivered by the source broker.
///
/// Ephemeral: created in the message callback, consumed synchronously by
/// the relay pipeline, discarded once the target publish call returns.
/// Never buffered or queued.
#[derive(Debug, Clone)]
pub struct RelayedMessage {
    /// Topic the source broker delivered on
    pub topic: String,
    /// Payload bytes
    pub payload: Bytes,
    /// Delivery quality of service (preserved on republish)
    pub qos: QoS,
    /// Retain flag (preserved on republish)
    pub retain: bool,
}

/// Events emitted by the forwarding engine
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Engine started: both endpoints connected, relay active
    Started,
    /// Engine stopped gracefully
    Stopped,
    /// Engine-level error (e.g. failure while stopping)
    Error(String),
    /// Source connection error
    SourceError(String),
    /// Target connection error
    TargetError(String),
    /// An endpoint reconnected after a connection loss
    Reconnected { endpoint: EndpointRole },
    /// An endpoint used up its reconnection attempts; terminal for
    /// that endpoint only, the other side keeps operating
    ReconnectExhausted { endpoint: EndpointRole },
    /// A message was relayed to the target
    MessageForwarded {
        original_topic: String,
        target_topic: String,
    },
    /// A message arrived while the target was not connected and was
    /// dropped (messages are never buffered for later replay)
    MessageDropped { topic: String },
    /// The target publish failed for one message
    ForwardError { topic: String, error: String },
    /// Validation or payload transform failed for one message
    ProcessingError { topic: String, error: String },
}
