//! Which keys each command reads, and the unused-key guard.
//!
//! A key in a config layer that no command in the current scope reads is
//! most likely a typo or a leftover; commands warn about it, or fail with
//! `--strict-config`. Keys are reported as dotted paths (`format.spec`).

use anyhow::{bail, Result};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Ingest,
    FormatCheck,
    /// `db`, `review`, `unreviewed` and `list`: database access only.
    Review,
}

impl ConfigScope {
    /// Commands the scope covers, for messages.
    pub fn command(&self) -> &'static str {
        match self {
            ConfigScope::Ingest => "vlg ingest",
            ConfigScope::FormatCheck => "vlg format check",
            ConfigScope::Review => "vlg db|review|unreviewed|list",
        }
    }
}

impl std::fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

struct KnownKey {
    path: &'static str,
    /// Everything below `path` is read too (free-form maps).
    subtree: bool,
    scopes: &'static [ConfigScope],
}

const ALL_SCOPES: &[ConfigScope] = &[
    ConfigScope::Ingest,
    ConfigScope::FormatCheck,
    ConfigScope::Review,
];

/// Every key `VlgSettings::from_config_json` reads.
const KNOWN_KEYS: &[KnownKey] = &[
    KnownKey {
        path: "store.database_url_env",
        subtree: false,
        scopes: ALL_SCOPES,
    },
    KnownKey {
        path: "ingest.detector",
        subtree: false,
        scopes: &[ConfigScope::Ingest],
    },
    KnownKey {
        path: "ingest.mark_stale",
        subtree: false,
        scopes: &[ConfigScope::Ingest],
    },
    KnownKey {
        path: "format.spec",
        subtree: false,
        scopes: &[ConfigScope::FormatCheck],
    },
    KnownKey {
        path: "format.detector",
        subtree: false,
        scopes: &[ConfigScope::FormatCheck],
    },
    KnownKey {
        path: "format.function",
        subtree: false,
        scopes: &[ConfigScope::FormatCheck],
    },
    KnownKey {
        path: "format.variables",
        subtree: true,
        scopes: &[ConfigScope::FormatCheck],
    },
];

impl KnownKey {
    fn covers(&self, dotted: &str) -> bool {
        dotted == self.path
            || (self.subtree
                && dotted
                    .strip_prefix(self.path)
                    .is_some_and(|rest| rest.starts_with('.')))
    }
}

/// Keys `scope` reads; free-form maps are listed as `path.*`.
pub fn known_keys(scope: ConfigScope) -> Vec<String> {
    KNOWN_KEYS
        .iter()
        .filter(|k| k.scopes.contains(&scope))
        .map(|k| {
            if k.subtree {
                format!("{}.*", k.path)
            } else {
                k.path.to_string()
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedKeyReport {
    pub scope: ConfigScope,
    /// Dotted paths of configured values nothing in `scope` reads, sorted.
    pub unused: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused.is_empty()
    }
}

/// Compare the configured values against what `scope` reads. With
/// `UnusedKeyPolicy::Fail` any unused key is an error.
pub fn report_unused_keys(
    scope: ConfigScope,
    config: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let mut unused = Vec::new();
    walk_leaves(config, &mut |path, _| {
        let dotted = path.join(".");
        let read = KNOWN_KEYS
            .iter()
            .any(|k| k.scopes.contains(&scope) && k.covers(&dotted));
        if !read {
            unused.push(dotted);
        }
    });
    unused.sort();
    unused.dedup();

    if policy == UnusedKeyPolicy::Fail && !unused.is_empty() {
        bail!(
            "CONFIG_UNUSED_KEYS: `{scope}` does not read {} configured key(s): {}",
            unused.len(),
            unused.join(", ")
        );
    }
    Ok(UnusedKeyReport { scope, unused })
}

/// Call `f` with the key path of every non-container value.
pub(crate) fn walk_leaves(value: &Value, f: &mut dyn FnMut(&[String], &Value)) {
    fn walk(value: &Value, path: &mut Vec<String>, f: &mut dyn FnMut(&[String], &Value)) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    path.push(key.clone());
                    walk(child, path, f);
                    path.pop();
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push(i.to_string());
                    walk(child, path, f);
                    path.pop();
                }
            }
            leaf => f(path, leaf),
        }
    }
    walk(value, &mut Vec::new(), f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subtree_key_does_not_cover_lookalike_siblings() {
        let config = json!({"format": {"variables": {"Year": 2024}, "variables_extra": 1}});
        let report =
            report_unused_keys(ConfigScope::FormatCheck, &config, UnusedKeyPolicy::Warn).unwrap();
        assert_eq!(report.unused, vec!["format.variables_extra".to_string()]);
    }

    #[test]
    fn each_scope_reads_only_its_own_sections() {
        let config = json!({
            "store": {"database_url_env": "VLG_DATABASE_URL"},
            "ingest": {"detector": "cppcheck", "mark_stale": true},
            "format": {"spec": "a.fmt", "detector": "hdr", "function": "f", "variables": {"X": 1}},
        });
        let ingest = report_unused_keys(ConfigScope::Ingest, &config, UnusedKeyPolicy::Warn)
            .unwrap()
            .unused;
        assert!(ingest.iter().all(|k| k.starts_with("format.")));
        assert_eq!(ingest.len(), 4);

        let review = report_unused_keys(ConfigScope::Review, &config, UnusedKeyPolicy::Warn)
            .unwrap()
            .unused;
        assert_eq!(review.len(), 6);
        assert!(!review.contains(&"store.database_url_env".to_string()));
    }

    #[test]
    fn known_keys_mark_free_form_maps() {
        let keys = known_keys(ConfigScope::FormatCheck);
        assert!(keys.contains(&"format.variables.*".to_string()));
        assert!(keys.contains(&"store.database_url_env".to_string()));
        assert!(!keys.contains(&"ingest.detector".to_string()));
    }
}
