//! `vlg` configuration.
//!
//! Config is one or more YAML layers merged in order: mappings merge key by
//! key, anything else in a later layer replaces the earlier value, and an
//! empty layer changes nothing. The merged document is read through
//! [`VlgSettings`]; connection strings never live in it, only the names of
//! the env vars that hold them.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fs;

mod keys;
mod secrets;
mod settings;

pub use keys::{known_keys, report_unused_keys, ConfigScope, UnusedKeyPolicy, UnusedKeyReport};
pub use secrets::{reject_secret_literals, resolve_database_url, ResolvedDatabaseUrl};
pub use settings::{
    FormatSettings, IngestSettings, VlgSettings, DEFAULT_DATABASE_URL_ENV,
    DEFAULT_FORMAT_DETECTOR,
};

/// Merged config plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Layer labels in merge order (file paths, or `layer N` for strings).
    pub sources: Vec<String>,
    pub value: Value,
}

/// Read and merge YAML files, later paths overriding earlier ones.
pub fn load_layered_yaml<P: AsRef<str>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut layers = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config layer {path}"))?;
        layers.push((path.to_string(), text));
    }
    merge_layers(layers)
}

/// [`load_layered_yaml`] over in-memory documents.
pub fn load_layered_yaml_from_strings(docs: &[&str]) -> Result<LoadedConfig> {
    merge_layers(
        docs.iter()
            .enumerate()
            .map(|(i, doc)| (format!("layer {}", i + 1), doc.to_string()))
            .collect(),
    )
}

fn merge_layers(layers: Vec<(String, String)>) -> Result<LoadedConfig> {
    let mut value = Value::Object(Map::new());
    let mut sources = Vec::with_capacity(layers.len());

    for (label, text) in layers {
        let layer: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(&text)
                .with_context(|| format!("config {label}: invalid yaml"))?
        };
        if !matches!(layer, Value::Object(_) | Value::Null) {
            bail!("CONFIG_TYPE_ERROR config {label}: top level must be a mapping");
        }
        merge_layer(&mut value, layer);
        sources.push(label);
    }

    reject_secret_literals(&value)?;
    Ok(LoadedConfig { sources, value })
}

fn merge_layer(base: &mut Value, layer: Value) {
    match (base, layer) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                merge_layer(base_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}
