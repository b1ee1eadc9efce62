//! External data models: turns CSV, JSON, YAML or TOML documents into the
//! bindings of the global frame.
//!
//! - A CSV file is bound as `csv`, a list of row mappings keyed by header.
//! - JSON, YAML and TOML documents must be a mapping; each top-level key
//!   becomes a global.
//!
//! Text fields that look numeric (only digits, optionally with a single
//! decimal point) are converted to integers or floats on the way in.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::value::Value;

/// Global bindings handed to a render call.
pub type Model = HashMap<String, Value>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to read model file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid CSV model: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid JSON model: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML model: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML model: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported model format for '{0}' (expected .csv, .json, .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("model document must be a mapping at the top level")]
    NotAMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Yaml,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Format::Csv),
            Some("json") => Ok(Format::Json),
            Some("yaml" | "yml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            _ => Err(ModelError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Loads a model file, picking the format from its extension.
pub fn load_model(path: &Path) -> Result<Model, ModelError> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let model = parse_model(&text, format)?;
    info!(
        "loaded {:?} model from {} with {} bindings",
        format,
        path.display(),
        model.len()
    );
    Ok(model)
}

pub fn parse_model(text: &str, format: Format) -> Result<Model, ModelError> {
    match format {
        Format::Csv => {
            let rows = csv_rows(text)?;
            Ok(Model::from([("csv".to_string(), Value::Array(rows))]))
        }
        Format::Json => from_root(from_json(serde_json::from_str(text)?)),
        Format::Yaml => from_root(from_yaml(serde_yaml::from_str(text)?)),
        Format::Toml => {
            let table: toml::Table = toml::from_str(text)?;
            Ok(table
                .into_iter()
                .map(|(k, v)| (k, from_toml(v)))
                .collect())
        }
    }
}

/// Converts numeric-looking text: `"34"` becomes `34`, `"2500.00"` becomes
/// `2500.0`. Anything else, including signed numbers, stays text.
pub fn coerce_scalar(text: &str) -> Value {
    let digits = text.chars().filter(char::is_ascii_digit).count();
    let dots = text.chars().filter(|&c| c == '.').count();
    let numeric = digits > 0 && digits + dots == text.chars().count();

    if numeric && dots == 0 {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Int(n);
        }
    } else if numeric && dots == 1 {
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
    }
    Value::String(text.to_string())
}

fn from_root(value: Value) -> Result<Model, ModelError> {
    match value {
        Value::Map(map) => Ok(map.into_iter().collect()),
        _ => Err(ModelError::NotAMapping),
    }
}

fn csv_rows(text: &str) -> Result<Vec<Value>, ModelError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: BTreeMap<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.to_string(), coerce_scalar(field)))
            .collect();
        rows.push(Value::Map(row));
    }
    Ok(rows)
}

fn from_json(value: serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match value {
        Json::Null => Value::String(String::new()),
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => coerce_scalar(&s),
        Json::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        Json::Object(map) => Value::Map(map.into_iter().map(|(k, v)| (k, from_json(v))).collect()),
    }
}

fn from_yaml(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;
    match value {
        Yaml::Null => Value::String(String::new()),
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Yaml::String(s) => coerce_scalar(&s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(from_yaml).collect()),
        Yaml::Mapping(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), from_yaml(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;
    match key {
        Yaml::String(s) => s,
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => String::new(),
        other => from_yaml(other).to_string(),
    }
}

fn from_toml(value: toml::Value) -> Value {
    use toml::Value as Toml;
    match value {
        Toml::String(s) => coerce_scalar(&s),
        Toml::Integer(i) => Value::Int(i),
        Toml::Float(f) => Value::Float(f),
        Toml::Boolean(b) => Value::Bool(b),
        Toml::Datetime(dt) => Value::String(dt.to_string()),
        Toml::Array(items) => Value::Array(items.into_iter().map(from_toml).collect()),
        Toml::Table(table) => Value::Map(table.into_iter().map(|(k, v)| (k, from_toml(v))).collect()),
    }
}
