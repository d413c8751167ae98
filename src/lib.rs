//! mqrelay - MQTT broker-to-broker message relay
//!
//! Subscribes to a source broker, rewrites topics (prefix or exact
//! mapping), and republishes to a target broker while preserving QoS
//! and retain flags. Each endpoint carries its own reconnection policy.

pub mod config;
pub mod relay;
pub mod route;

pub use config::{Config, EndpointConfig, ReconnectConfig, RouteConfig};
pub use relay::{
    ConnectionManager, ConnectionState, EndpointRole, EngineStatus, ForwardingEngine,
    MqttTransport, RelayError, RelayEvent, RelayedMessage, Transport, TransportEvent,
};
pub use route::TopicRoute;

pub use rumqttc::QoS;
