//! Layered config as the CLI reads it.
//!
//! GREEN when:
//! - a site layer overrides single keys of the base and keeps the rest;
//! - layer labels come back in merge order;
//! - the merged document types into `VlgSettings`;
//! - an unreadable path names the path.

use std::collections::BTreeMap;

use vlg_config::{load_layered_yaml, load_layered_yaml_from_strings, VlgSettings};

const BASE_YAML: &str = r#"
ingest:
  detector: "cppcheck"
  mark_stale: true
format:
  spec: "specs/license.fmt"
  variables:
    Owner: "ACME"
    Year: 2023
"#;

const SITE_YAML: &str = r#"
ingest:
  mark_stale: false
format:
  variables:
    Year: 2024
"#;

#[test]
fn site_layer_overrides_single_keys() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, SITE_YAML]).unwrap();
    assert_eq!(loaded.sources, vec!["layer 1", "layer 2"]);

    let settings = VlgSettings::from_config_json(&loaded.value).unwrap();
    assert_eq!(settings.ingest.detector.as_deref(), Some("cppcheck"));
    assert!(!settings.ingest.mark_stale);
    assert_eq!(settings.format.spec.as_deref(), Some("specs/license.fmt"));

    let expected: BTreeMap<String, String> = [("Owner", "ACME"), ("Year", "2024")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(settings.format.variables, expected);
}

#[test]
fn layer_order_matters() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, SITE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[SITE_YAML, BASE_YAML]).unwrap();
    assert_ne!(a.value, b.value);
    assert_eq!(
        b.value.pointer("/ingest/mark_stale"),
        Some(&serde_json::Value::Bool(true))
    );
}

#[test]
fn unreadable_layer_names_its_path() {
    let err = load_layered_yaml(&["/nonexistent/vlg/site.yaml"]).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("/nonexistent/vlg/site.yaml"), "got: {msg}");
}
