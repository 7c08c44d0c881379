use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use super::error::UnitConfigError;
use super::unit::ProcessingUnit;

/// The per-unit configuration document (config.txt).
///
/// A human-editable YAML mapping of string keys to scalars. Key order is the
/// document order, which the Collator relies on when flattening rows. Keys and
/// values are not validated on read; the typed getters report missing or
/// ill-typed keys at the point of use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitConfig {
    entries: Mapping,
}

impl UnitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(entries: Mapping) -> Self {
        Self { entries }
    }

    /// Read the configuration of a unit
    pub fn read(unit: &ProcessingUnit) -> Result<Self, UnitConfigError> {
        Self::read_file(&unit.config_path())
    }

    /// Read a configuration document from a YAML file.
    ///
    /// An empty document is an empty configuration; anything other than a mapping is an error.
    pub fn read_file(path: &Path) -> Result<Self, UnitConfigError> {
        if !path.exists() {
            return Err(UnitConfigError::BadFilePath(path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(path)?;
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }

        match serde_yaml::from_str::<Value>(&yaml_str)? {
            Value::Mapping(entries) => Ok(Self { entries }),
            Value::Null => Ok(Self::default()),
            _ => Err(UnitConfigError::NotAMapping(path.to_path_buf())),
        }
    }

    /// Overwrite the configuration of a unit
    pub fn write(&self, unit: &ProcessingUnit) -> Result<(), UnitConfigError> {
        self.write_file(&unit.config_path())
    }

    pub fn write_file(&self, path: &Path) -> Result<(), UnitConfigError> {
        let yaml_str = serde_yaml::to_string(&self.entries)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Set a key, keeping its position if it already exists. Returns the previous value.
    pub fn set(&mut self, key: &str, value: Value) -> Option<Value> {
        self.entries.insert(Value::String(key.to_string()), value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mapping(&self) -> &Mapping {
        &self.entries
    }

    /// Keys in document order, rendered as text
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().map(render_scalar).collect()
    }

    /// Values in document order, rendered as text
    pub fn rendered_values(&self) -> Vec<String> {
        self.entries.values().map(render_scalar).collect()
    }

    fn require(&self, key: &str) -> Result<&Value, UnitConfigError> {
        self.get(key)
            .ok_or_else(|| UnitConfigError::MissingKey(key.to_string()))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, UnitConfigError> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| bad_value(key, "a number"))
    }

    pub fn get_u32(&self, key: &str) -> Result<u32, UnitConfigError> {
        self.require(key)?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| bad_value(key, "a non-negative integer"))
    }

    /// Booleans may also be written as 0/1
    pub fn get_bool(&self, key: &str) -> Result<bool, UnitConfigError> {
        match self.require(key)? {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
            Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
            _ => Err(bad_value(key, "a boolean or 0/1")),
        }
    }

    pub fn get_path(&self, key: &str) -> Result<PathBuf, UnitConfigError> {
        match self.require(key)? {
            Value::String(s) if !s.is_empty() => Ok(PathBuf::from(s)),
            _ => Err(bad_value(key, "a file path")),
        }
    }
}

fn bad_value(key: &str, expected: &'static str) -> UnitConfigError {
    UnitConfigError::BadValue {
        key: key.to_string(),
        expected,
    }
}

/// Render a YAML value as a single text cell
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => render_scalar(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Interpret command line text as a YAML scalar (`0.5` is a number, `true` a bool).
/// Anything that is not a scalar is kept as a plain string.
pub fn parse_scalar(text: &str) -> Value {
    match serde_yaml::from_str::<Value>(text) {
        Ok(v @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => v,
        _ => Value::String(text.to_string()),
    }
}
