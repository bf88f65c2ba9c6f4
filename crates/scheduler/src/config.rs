use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("capacity of '{0}' must be positive")]
    InvalidCapacity(String),
}

/// Scheduler configuration, typically parsed from TOML.
///
/// ```toml
/// default_capacity = 100
///
/// [plugins.Systemd]
/// capacity = 4
/// options = { Timeout = "5" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity of plugins without an explicit override.
    #[serde(default = "default_capacity")]
    pub default_capacity: usize,
    /// Per-plugin settings keyed by plugin name.
    #[serde(default)]
    pub plugins: HashMap<String, PluginOptions>,
}

/// Settings of a single plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginOptions {
    /// Maximum summed weight of concurrently executing tasks.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Handed verbatim to the plugin's configurator task.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_capacity() -> usize {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_capacity: default_capacity(),
            plugins: HashMap::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("default_capacity".into()));
        }
        for (name, plugin) in &self.plugins {
            if plugin.capacity == Some(0) {
                return Err(ConfigError::InvalidCapacity(name.clone()));
            }
        }
        Ok(())
    }

    pub fn capacity_for(&self, plugin: &str) -> usize {
        self.plugins
            .get(plugin)
            .and_then(|p| p.capacity)
            .unwrap_or(self.default_capacity)
    }

    pub fn options_for(&self, plugin: &str) -> HashMap<String, String> {
        self.plugins
            .get(plugin)
            .map(|p| p.options.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.default_capacity, 100);
        assert_eq!(config.capacity_for("Anything"), 100);
        assert!(config.options_for("Anything").is_empty());
    }

    #[test]
    fn parse_plugin_overrides() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            default_capacity = 10

            [plugins.Systemd]
            capacity = 2
            options = { Timeout = "5" }

            [plugins.Log]
            options = { MaxLinesPerSecond = "20" }
            "#,
        )
        .unwrap();

        assert_eq!(config.capacity_for("Systemd"), 2);
        assert_eq!(config.capacity_for("Log"), 10);
        assert_eq!(config.options_for("Systemd")["Timeout"], "5");
        assert_eq!(config.options_for("Log")["MaxLinesPerSecond"], "20");
    }

    #[test]
    fn empty_text_uses_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config.default_capacity, 100);
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = SchedulerConfig::from_toml_str("[plugins.Cpu]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity(ref name) if name == "Cpu"));

        let err = SchedulerConfig::from_toml_str("default_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity(_)));
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let err = SchedulerConfig::from_toml_str("default_capacity = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
