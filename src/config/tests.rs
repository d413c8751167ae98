//! Config module tests

use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("MQRELAY_TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${MQRELAY_TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("MQRELAY_TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    // Unset var should use default
    std::env::remove_var("MQRELAY_TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${MQRELAY_TEST_VAR_UNSET:-default_value}\"");
    assert_eq!(result, "value = \"default_value\"");

    // Set var should use env value
    std::env::set_var("MQRELAY_TEST_VAR_SET", "env_value");
    let result = substitute_env_vars("value = \"${MQRELAY_TEST_VAR_SET:-default_value}\"");
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("MQRELAY_TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("MQRELAY_TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${MQRELAY_TEST_VAR_MISSING}\"");
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.log.level, "info");
    assert_eq!(config.source.address, "localhost:1883");
    assert_eq!(config.source.topics, vec!["#".to_string()]);
    assert_eq!(config.source.keepalive, Duration::from_secs(60));
    assert_eq!(config.source.connect_timeout, Duration::from_secs(30));
    assert!(config.source.reconnect.is_none());
    assert!(config.route.topic_prefix.is_none());
    assert!(config.route.topic_mapping.is_empty());
    assert_eq!(config.reconnect.max_attempts, 10);
    assert_eq!(config.reconnect.delay, Duration::from_secs(5));
}

#[test]
fn test_parse_full_config() {
    let toml_str = r#"
        [log]
        level = "debug"

        [source]
        address = "broker-a.example.com:1884"
        username = "reader"
        password = "secret"
        client_id = "relay-source-01"
        topics = ["sensors/#", "status/+"]
        keepalive = "30s"
        connect_timeout = "10s"

        [target]
        address = "broker-b.example.com"

        [route]
        topic_prefix = "site1"

        [reconnect]
        max_attempts = 3
        delay = "2s"
    "#;

    let config = Config::parse(toml_str).unwrap();

    assert_eq!(config.log.level, "debug");
    assert_eq!(config.source.address, "broker-a.example.com:1884");
    assert_eq!(config.source.username, Some("reader".to_string()));
    assert_eq!(config.source.password, Some("secret".to_string()));
    assert_eq!(config.source.client_id, Some("relay-source-01".to_string()));
    assert_eq!(config.source.topics, vec!["sensors/#", "status/+"]);
    assert_eq!(config.source.keepalive, Duration::from_secs(30));
    assert_eq!(config.source.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.target.address, "broker-b.example.com");
    assert_eq!(config.route.topic_prefix, Some("site1".to_string()));
    assert_eq!(config.reconnect.max_attempts, 3);
    assert_eq!(config.reconnect.delay, Duration::from_secs(2));
}

#[test]
fn test_parse_topic_mapping() {
    let toml_str = r#"
        [route.topic_mapping]
        "sensors/temp" = "backup/temperature"
        "sensors/hum" = "backup/humidity"
    "#;

    let config = Config::parse(toml_str).unwrap();

    assert_eq!(
        config.route.topic_mapping.get("sensors/temp"),
        Some(&"backup/temperature".to_string())
    );
    assert_eq!(
        config.route.topic_mapping.get("sensors/hum"),
        Some(&"backup/humidity".to_string())
    );
}

#[test]
fn test_per_endpoint_reconnect_override() {
    let toml_str = r#"
        [reconnect]
        max_attempts = 10
        delay = "5s"

        [target.reconnect]
        max_attempts = 2
        delay = "1s"
    "#;

    let config = Config::parse(toml_str).unwrap();

    assert!(config.source.reconnect.is_none());
    let target = config.target.reconnect.unwrap();
    assert_eq!(target.max_attempts, 2);
    assert_eq!(target.delay, Duration::from_secs(1));
}

#[test]
fn test_parse_address_with_port() {
    let endpoint = EndpointConfig {
        address: "broker.example.com:9883".to_string(),
        ..Default::default()
    };
    let (host, port) = endpoint.parse_address();
    assert_eq!(host, "broker.example.com");
    assert_eq!(port, 9883);
}

#[test]
fn test_parse_address_without_port() {
    let endpoint = EndpointConfig {
        address: "broker.example.com".to_string(),
        ..Default::default()
    };
    let (host, port) = endpoint.parse_address();
    assert_eq!(host, "broker.example.com");
    assert_eq!(port, 1883);
}

#[test]
fn test_validate_rejects_empty_address() {
    let mut config = Config::default();
    config.target.address = String::new();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_validate_rejects_trailing_slash_prefix() {
    let mut config = Config::default();
    config.route.topic_prefix = Some("site1/".to_string());

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_validate_rejects_empty_mapping_entry() {
    let mut config = Config::default();
    config
        .route
        .topic_mapping
        .insert("sensors/temp".to_string(), String::new());

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_validate_rejects_empty_topic_filter() {
    let mut config = Config::default();
    config.source.topics = vec![String::new()];

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_validate_rejects_zero_keepalive() {
    let mut config = Config::default();
    config.source.keepalive = Duration::ZERO;

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_validate_allows_prefix_and_mapping_together() {
    // Prefix wins at resolution time; the combination itself is legal.
    let mut config = Config::default();
    config.route.topic_prefix = Some("site1".to_string());
    config
        .route
        .topic_mapping
        .insert("a".to_string(), "b".to_string());

    assert!(config.validate().is_ok());
}
