//! MQTT Relay Core
//!
//! Everything between two broker connections: the transport seam over
//! the MQTT client library, the per-endpoint connection managers, the
//! forwarding engine that ties them together, and the typed events the
//! engine emits for observers.

mod engine;
mod event;
mod manager;
mod transform;
mod transport;


pub use engine::{EngineStatus, ForwardingEngine};
pub use event::{EndpointRole, RelayEvent, RelayedMessage};
pub use manager::{ConnectionManager, ConnectionState, EndpointStatus};
pub use transform::{validate_message, PayloadTransform};
pub use transport::{MqttTransport, RelayError, Transport, TransportEvent};
