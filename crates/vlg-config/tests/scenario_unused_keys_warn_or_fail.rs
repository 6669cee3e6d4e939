//! Unused-key guard.
//!
//! GREEN when:
//! - WARN reports keys the command does not read, sorted, without failing;
//! - FAIL names the command and every unused key;
//! - a whole `format.variables` map counts as read by `format check`.

use vlg_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigScope, UnusedKeyPolicy};

const YAML: &str = r#"
store:
  database_url_env: "VLG_DATABASE_URL"
ingest:
  detector: "cppcheck"
format:
  spec: "specs/header.fmt"
  variables:
    Year: 2024
    Owner: "ACME"
legacy:
  zeta: 1
  alpha: 2
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();

    let report =
        report_unused_keys(ConfigScope::FormatCheck, &loaded.value, UnusedKeyPolicy::Warn)
            .expect("warn mode must not error");

    assert_eq!(report.scope, ConfigScope::FormatCheck);
    assert_eq!(
        report.unused,
        vec![
            "ingest.detector".to_string(),
            "legacy.alpha".to_string(),
            "legacy.zeta".to_string(),
        ]
    );
}

#[test]
fn fail_mode_names_command_and_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();

    let err = report_unused_keys(ConfigScope::Review, &loaded.value, UnusedKeyPolicy::Fail)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "got: {msg}");
    assert!(msg.contains("vlg db|review|unreviewed|list"), "got: {msg}");
    assert!(msg.contains("format.variables.Owner"), "got: {msg}");
}

#[test]
fn fully_read_config_is_clean() {
    let yaml = r#"
store:
  database_url_env: "VLG_DATABASE_URL"
ingest:
  detector: "cppcheck"
  mark_stale: false
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(ConfigScope::Ingest, &loaded.value, UnusedKeyPolicy::Fail)
        .expect("clean config must pass in FAIL mode");
    assert!(report.is_clean());
}
