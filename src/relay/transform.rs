//! Message Validation and Payload Transform
//!
//! Validation guards the relay pipeline against messages that cannot be
//! republished; the transform hook is the configured extension point for
//! payload rewriting (identity when unset).

use std::sync::Arc;

use bytes::Bytes;

use super::transport::RelayError;

/// Payload transform hook applied before the target publish.
///
/// Receives the original topic and payload and returns the payload to
/// publish. A returned error is treated as a processing error: the
/// message is dropped and an event is emitted, the relay keeps running.
pub type PayloadTransform =
    Arc<dyn Fn(&str, &Bytes) -> Result<Bytes, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Validate a message delivered by the source broker.
///
/// A topic must be non-empty and publishable: wildcard characters are
/// only legal in subscription filters, never in a published topic.
pub fn validate_message(topic: &str) -> Result<(), RelayError> {
    if topic.is_empty() {
        return Err(RelayError::InvalidMessage("empty topic".to_string()));
    }
    if topic.contains(['#', '+']) {
        return Err(RelayError::InvalidMessage(format!(
            "wildcard in published topic: {}",
            topic
        )));
    }
    if topic.contains('\0') {
        return Err(RelayError::InvalidMessage(
            "null character in topic".to_string(),
        ));
    }
    Ok(())
}
