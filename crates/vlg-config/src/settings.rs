//! Typed view of the keys the `vlg` commands read.
//!
//! Every key read here is listed in `keys::KNOWN_KEYS`.
//! Absent keys take defaults; present keys of the wrong type are errors.

use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Env var holding the database URL unless `/store/database_url_env` names another.
pub const DEFAULT_DATABASE_URL_ENV: &str = "VLG_DATABASE_URL";

/// `detectedBy` used for format-check findings when none is configured.
pub const DEFAULT_FORMAT_DETECTOR: &str = "format-check";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub detector: Option<String>,
    /// Close out unreported rows at the end of each run.
    pub mark_stale: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            detector: None,
            mark_stale: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSettings {
    /// Path of the format spec file.
    pub spec: Option<String>,
    pub detector: String,
    /// Function column for emitted findings.
    pub function: String,
    /// `${name}` substitutions applied to the spec.
    pub variables: BTreeMap<String, String>,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            spec: None,
            detector: DEFAULT_FORMAT_DETECTOR.to_string(),
            function: String::new(),
            variables: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlgSettings {
    /// Name (not value) of the env var holding the database URL.
    pub database_url_env: String,
    pub ingest: IngestSettings,
    pub format: FormatSettings,
}

impl Default for VlgSettings {
    fn default() -> Self {
        Self {
            database_url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
            ingest: IngestSettings::default(),
            format: FormatSettings::default(),
        }
    }
}

impl VlgSettings {
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let defaults = VlgSettings::default();

        let database_url_env =
            read_string(config, "/store/database_url_env")?.unwrap_or(defaults.database_url_env);

        let ingest = IngestSettings {
            detector: read_string(config, "/ingest/detector")?,
            mark_stale: read_bool(config, "/ingest/mark_stale")?
                .unwrap_or(defaults.ingest.mark_stale),
        };

        let mut variables = BTreeMap::new();
        match config.pointer("/format/variables") {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => bail!("CONFIG_TYPE_ERROR /format/variables/{k}: expected a scalar"),
                    };
                    variables.insert(k.clone(), value);
                }
            }
            Some(_) => bail!("CONFIG_TYPE_ERROR /format/variables: expected a mapping"),
        }

        let format = FormatSettings {
            spec: read_string(config, "/format/spec")?,
            detector: read_string(config, "/format/detector")?
                .unwrap_or(defaults.format.detector),
            function: read_string(config, "/format/function")?.unwrap_or_default(),
            variables,
        };

        Ok(Self {
            database_url_env,
            ingest,
            format,
        })
    }
}

/// Trimmed string at `pointer`; blank counts as absent.
fn read_string(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
        Some(_) => bail!("CONFIG_TYPE_ERROR {pointer}: expected a string"),
    }
}

fn read_bool(config: &Value, pointer: &str) -> Result<Option<bool>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => bail!("CONFIG_TYPE_ERROR {pointer}: expected a boolean"),
    }
}
