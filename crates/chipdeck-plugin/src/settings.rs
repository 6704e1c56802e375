//! Typed key/value configuration shared between host and adapters.
//!
//! Adapters register their keys with defaults at construction time; the host
//! overrides values later (from a config file or UI) without knowing which
//! adapter owns which key. Lookups are type-checked against the registered
//! default, so a typo'd key or a string where an int was registered surfaces
//! as an error instead of a silent fallback.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{PluginError, Result};

/// One configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// String value.
    Str(String),
}

impl SettingValue {
    fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Int(_) => "int",
            SettingValue::Float(_) => "float",
            SettingValue::Bool(_) => "bool",
            SettingValue::Str(_) => "str",
        }
    }

    fn same_type(&self, other: &SettingValue) -> bool {
        self.type_name() == other.type_name()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    default: SettingValue,
    value: Option<SettingValue>,
}

/// Registry of typed settings with per-key defaults.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    entries: HashMap<String, Entry>,
}

impl Settings {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integer key with its default.
    pub fn register_int(&mut self, key: &str, default: i64) {
        self.register(key, SettingValue::Int(default));
    }

    /// Register a float key with its default.
    pub fn register_float(&mut self, key: &str, default: f64) {
        self.register(key, SettingValue::Float(default));
    }

    /// Register a boolean key with its default.
    pub fn register_bool(&mut self, key: &str, default: bool) {
        self.register(key, SettingValue::Bool(default));
    }

    /// Register a string key with its default.
    pub fn register_str(&mut self, key: &str, default: &str) {
        self.register(key, SettingValue::Str(default.to_string()));
    }

    fn register(&mut self, key: &str, default: SettingValue) {
        self.entries.entry(key.to_string()).or_insert(Entry {
            default,
            value: None,
        });
    }

    /// Override a registered key.
    ///
    /// Fails on unknown keys and on values whose type differs from the
    /// registered default.
    pub fn set(&mut self, key: &str, value: SettingValue) -> Result<()> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| PluginError::Settings(format!("unknown setting: {key}")))?;
        if !entry.default.same_type(&value) {
            return Err(PluginError::Settings(format!(
                "setting {key} expects {}, got {}",
                entry.default.type_name(),
                value.type_name()
            )));
        }
        entry.value = Some(value);
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<&SettingValue> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| PluginError::Settings(format!("unknown setting: {key}")))?;
        Ok(entry.value.as_ref().unwrap_or(&entry.default))
    }

    /// Current integer value of `key` (override or default).
    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.lookup(key)? {
            SettingValue::Int(v) => Ok(*v),
            other => Err(type_mismatch(key, "int", other)),
        }
    }

    /// Current float value of `key` (override or default).
    pub fn get_float(&self, key: &str) -> Result<f64> {
        match self.lookup(key)? {
            SettingValue::Float(v) => Ok(*v),
            other => Err(type_mismatch(key, "float", other)),
        }
    }

    /// Current boolean value of `key` (override or default).
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.lookup(key)? {
            SettingValue::Bool(v) => Ok(*v),
            other => Err(type_mismatch(key, "bool", other)),
        }
    }

    /// Current string value of `key` (override or default).
    pub fn get_str(&self, key: &str) -> Result<String> {
        match self.lookup(key)? {
            SettingValue::Str(v) => Ok(v.clone()),
            other => Err(type_mismatch(key, "str", other)),
        }
    }

    /// Registered keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

fn type_mismatch(key: &str, wanted: &str, got: &SettingValue) -> PluginError {
    PluginError::Settings(format!(
        "setting {key} holds {}, asked for {wanted}",
        got.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_until_overridden() {
        let mut settings = Settings::new();
        settings.register_int("bridge.sample_rate", 44_100);
        assert_eq!(settings.get_int("bridge.sample_rate").unwrap(), 44_100);

        settings
            .set("bridge.sample_rate", SettingValue::Int(48_000))
            .unwrap();
        assert_eq!(settings.get_int("bridge.sample_rate").unwrap(), 48_000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut settings = Settings::new();
        assert!(settings.set("nope", SettingValue::Int(1)).is_err());
        assert!(settings.get_int("nope").is_err());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut settings = Settings::new();
        settings.register_str("player.program", "uade123");

        let err = settings.set("player.program", SettingValue::Int(5));
        assert!(err.is_err());
        assert!(settings.get_int("player.program").is_err());
        assert_eq!(settings.get_str("player.program").unwrap(), "uade123");
    }

    #[test]
    fn test_reregister_keeps_existing_entry() {
        let mut settings = Settings::new();
        settings.register_str("player.args", "{file}");
        settings
            .set("player.args", SettingValue::Str("-v {file}".into()))
            .unwrap();
        // Second adapter instance registering the same key must not wipe the
        // host's override.
        settings.register_str("player.args", "{file}");
        assert_eq!(settings.get_str("player.args").unwrap(), "-v {file}");
    }

    #[test]
    fn test_setting_value_json_untagged() {
        let v: SettingValue = serde_json::from_str("\"uade123\"").unwrap();
        assert_eq!(v, SettingValue::Str("uade123".into()));
        let v: SettingValue = serde_json::from_str("600").unwrap();
        assert_eq!(v, SettingValue::Int(600));
        let v: SettingValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, SettingValue::Bool(true));
    }
}
