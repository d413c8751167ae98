//! Topic Routing
//!
//! Resolves the outgoing (target-side) topic for every relayed message.
//! Two rewrite modes are supported: a static prefix prepended to every
//! topic, or an exact source-topic to target-topic mapping table. With
//! neither configured the topic passes through unchanged.

use std::collections::HashMap;

use crate::config::RouteConfig;

/// Compiled topic route for the relay hot path.
///
/// Resolution is a pure function of (topic, route config) and never fails,
/// so it can run inline in the forwarding pipeline without error handling.
#[derive(Debug, Clone, Default)]
pub struct TopicRoute {
    /// Prefix prepended to every relayed topic
    prefix: Option<String>,
    /// Exact source-topic to target-topic table
    mapping: HashMap<String, String>,
}

impl TopicRoute {
    /// Build a route from configuration.
    pub fn new(config: &RouteConfig) -> Self {
        Self {
            prefix: config.topic_prefix.clone(),
            mapping: config.topic_mapping.clone(),
        }
    }

    /// A route that returns every topic unchanged.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Resolve the outgoing topic for an incoming one.
    ///
    /// Prefix mode takes precedence over the mapping table when both are
    /// configured. Mapping keys must equal the received topic literally;
    /// there is no wildcard or regex expansion. Topics absent from the
    /// mapping pass through unchanged.
    pub fn resolve(&self, topic: &str) -> String {
        if let Some(prefix) = &self.prefix {
            return format!("{}/{}", prefix, topic);
        }
        if let Some(mapped) = self.mapping.get(topic) {
            return mapped.clone();
        }
        topic.to_string()
    }

    /// Whether this route rewrites anything at all.
    pub fn is_identity(&self) -> bool {
        self.prefix.is_none() && self.mapping.is_empty()
    }
}

#[cfg(test)]
mod tests;
