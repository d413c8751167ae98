//! Topic route tests

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use test_case::test_case;

use super::TopicRoute;
use crate::config::RouteConfig;

fn prefix_route(prefix: &str) -> TopicRoute {
    TopicRoute::new(&RouteConfig {
        topic_prefix: Some(prefix.to_string()),
        topic_mapping: HashMap::new(),
    })
}

fn mapping_route(pairs: &[(&str, &str)]) -> TopicRoute {
    TopicRoute::new(&RouteConfig {
        topic_prefix: None,
        topic_mapping: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    })
}

#[test_case("sensors/temp", "site1/sensors/temp"; "nested topic")]
#[test_case("status", "site1/status"; "single level")]
#[test_case("a/b/c/d", "site1/a/b/c/d"; "deep topic")]
fn prefix_mode_prepends(topic: &str, expected: &str) {
    let route = prefix_route("site1");
    assert_eq!(route.resolve(topic), expected);
}

#[test]
fn mapping_mode_rewrites_exact_matches() {
    let route = mapping_route(&[
        ("sensors/temp", "backup/temperature"),
        ("sensors/hum", "backup/humidity"),
    ]);

    assert_eq!(route.resolve("sensors/temp"), "backup/temperature");
    assert_eq!(route.resolve("sensors/hum"), "backup/humidity");
}

#[test]
fn mapping_mode_passes_unmapped_topics_through() {
    let route = mapping_route(&[("sensors/temp", "backup/temperature")]);

    assert_eq!(route.resolve("sensors/pressure"), "sensors/pressure");
    assert_eq!(route.resolve(""), "");
}

#[test]
fn mapping_keys_are_literal_not_patterns() {
    let route = mapping_route(&[("sensors/#", "backup/all")]);

    // "sensors/temp" does not literally equal the key "sensors/#"
    assert_eq!(route.resolve("sensors/temp"), "sensors/temp");
    assert_eq!(route.resolve("sensors/#"), "backup/all");
}

#[test]
fn prefix_wins_over_mapping() {
    let route = TopicRoute::new(&RouteConfig {
        topic_prefix: Some("site1".to_string()),
        topic_mapping: [("sensors/temp".to_string(), "mapped".to_string())]
            .into_iter()
            .collect(),
    });

    assert_eq!(route.resolve("sensors/temp"), "site1/sensors/temp");
}

#[test]
fn identity_route_returns_topic_unchanged() {
    let route = TopicRoute::identity();
    assert!(route.is_identity());
    assert_eq!(route.resolve("sensors/temp"), "sensors/temp");
}

#[test]
fn configured_route_is_not_identity() {
    assert!(!prefix_route("site1").is_identity());
    assert!(!mapping_route(&[("a", "b")]).is_identity());
}

proptest! {
    /// Prefix-only routes always produce `prefix + "/" + topic`.
    #[test]
    fn prefix_mode_for_any_topic(topic in "[a-zA-Z0-9/_-]{1,64}") {
        let route = prefix_route("edge");
        prop_assert_eq!(route.resolve(&topic), format!("edge/{}", topic));
    }

    /// Topics absent from a mapping-only route pass through unchanged.
    #[test]
    fn unmapped_topics_pass_through(topic in "[a-z0-9/]{1,64}") {
        let route = mapping_route(&[("only/this/key", "elsewhere")]);
        prop_assume!(topic != "only/this/key");
        prop_assert_eq!(route.resolve(&topic), topic);
    }
}
