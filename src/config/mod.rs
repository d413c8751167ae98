//! Configuration Module
//!
//! Provides TOML-based configuration for mqrelay with support for:
//! - Source and target broker endpoints (address, credentials, client id)
//! - Source subscription topic filters
//! - Topic routing (prefix or exact mapping)
//! - Per-endpoint reconnection policies
//! - Environment variable overrides (MQRELAY__* prefix)

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Source broker endpoint (messages are consumed from here)
    pub source: EndpointConfig,
    /// Target broker endpoint (messages are republished here)
    pub target: EndpointConfig,
    /// Topic rewrite rules applied between source and target
    pub route: RouteConfig,
    /// Reconnection policy applied to both endpoints unless overridden
    /// per endpoint via `[source.reconnect]` / `[target.reconnect]`
    pub reconnect: ReconnectConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration for one broker endpoint.
///
/// Immutable once the owning connection manager is constructed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Broker address (host:port or just host, default port 1883)
    pub address: String,

    /// Username for authentication
    pub username: Option<String>,

    /// Password for authentication
    pub password: Option<String>,

    /// Client ID; generated from the endpoint role when unset
    pub client_id: Option<String>,

    /// Subscription topic filters (source endpoint only)
    pub topics: Vec<String>,

    /// Keep-alive interval
    #[serde(with = "humantime_serde")]
    pub keepalive: Duration,

    /// Connection timeout covering transport connect and CONNACK
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Reconnection policy override for this endpoint
    pub reconnect: Option<ReconnectConfig>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: "localhost:1883".to_string(),
            username: None,
            password: None,
            client_id: None,
            topics: vec!["#".to_string()],
            keepalive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            reconnect: None,
        }
    }
}

impl EndpointConfig {
    /// Parse address into host and port
    pub fn parse_address(&self) -> (String, u16) {
        if let Some((host, port_str)) = self.address.rsplit_once(':') {
            if let Ok(port) = port_str.parse::<u16>() {
                return (host.to_string(), port);
            }
        }
        (self.address.clone(), 1883)
    }
}

/// Topic routing configuration.
///
/// At most one mode is effective: a prefix prepended to every relayed
/// topic, or an exact source-to-target mapping table. Prefix mode wins
/// when both are set. Neither set means topics pass through unchanged.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RouteConfig {
    /// Prefix prepended to every relayed topic
    pub topic_prefix: Option<String>,

    /// Exact source-topic to target-topic table
    pub topic_mapping: HashMap<String, String>,
}

/// Reconnection policy for one endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Maximum consecutive failed reconnection attempts before the
    /// endpoint is declared exhausted
    pub max_attempts: u32,

    /// Delay between reconnection attempts
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `MQRELAY__` prefix with double underscores for nesting:
    ///    - `MQRELAY__SOURCE__ADDRESS=broker-a:1883` overrides `source.address`
    ///    - `MQRELAY__RECONNECT__MAX_ATTEMPTS=3` overrides `reconnect.max_attempts`
    ///    - `MQRELAY__ROUTE__TOPIC_PREFIX=site1` overrides `route.topic_prefix`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        // Load from file with env var substitution
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        // Override with environment variables (MQRELAY__SOURCE__ADDRESS, etc.)
        // Double underscore separates nested keys, single underscore preserved in field names
        let cfg = builder
            .add_source(
                Environment::with_prefix("MQRELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides only (no file).
    ///
    /// Useful for containerized deployments where all config comes from env vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new(""))
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.address.is_empty() {
            return Err(ConfigError::Validation(
                "source.address must not be empty".to_string(),
            ));
        }
        if self.target.address.is_empty() {
            return Err(ConfigError::Validation(
                "target.address must not be empty".to_string(),
            ));
        }

        for filter in &self.source.topics {
            if filter.is_empty() {
                return Err(ConfigError::Validation(
                    "source.topics entries must not be empty".to_string(),
                ));
            }
        }

        if let Some(prefix) = &self.route.topic_prefix {
            if prefix.is_empty() {
                return Err(ConfigError::Validation(
                    "route.topic_prefix must not be empty when set".to_string(),
                ));
            }
            if prefix.ends_with('/') {
                return Err(ConfigError::Validation(format!(
                    "route.topic_prefix must not end with '/': {}",
                    prefix
                )));
            }
        }

        for (from, to) in &self.route.topic_mapping {
            if from.is_empty() || to.is_empty() {
                return Err(ConfigError::Validation(
                    "route.topic_mapping entries must not be empty".to_string(),
                ));
            }
        }

        for (name, endpoint) in [("source", &self.source), ("target", &self.target)] {
            if endpoint.keepalive.is_zero() {
                return Err(ConfigError::Validation(format!(
                    "{}.keepalive must be greater than zero",
                    name
                )));
            }
            if endpoint.connect_timeout.is_zero() {
                return Err(ConfigError::Validation(format!(
                    "{}.connect_timeout must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }
}
