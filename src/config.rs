//! Exporter configuration file.
//!
//! A JSON document with one optional section per collector; anything missing
//! falls back to defaults:
//!
//! ```json
//! {
//!   "collectors": ["scheduled_task", "update"],
//!   "scheduled_task": { "include": "/Microsoft/.+", "exclude": "" },
//!   "update": { "online": false, "scrape_interval": "6h" }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::collector::{ScheduledTaskConfig, UpdateConfig, scheduled_task, update};

/// Names accepted in the `collectors` list.
pub const KNOWN_COLLECTORS: &[&str] = &[scheduled_task::NAME, update::NAME];

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    UnknownCollector(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "invalid config: {}", e),
            ConfigError::UnknownCollector(name) => write!(
                f,
                "unknown collector '{}' (known: {})",
                name,
                KNOWN_COLLECTORS.join(", ")
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::UnknownCollector(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Enabled collectors, in registration order.
    pub collectors: Vec<String>,
    pub scheduled_task: ScheduledTaskConfig,
    pub update: UpdateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collectors: KNOWN_COLLECTORS.iter().map(|s| s.to_string()).collect(),
            scheduled_task: ScheduledTaskConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

impl Config {
    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Rejects collector names nothing can build.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self
            .collectors
            .iter()
            .find(|name| !KNOWN_COLLECTORS.contains(&name.as_str()))
        {
            Some(name) => Err(ConfigError::UnknownCollector(name.clone())),
            None => Ok(()),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.collectors.iter().any(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_defaults_enable_everything() {
        let config = Config::default();
        assert!(config.is_enabled("scheduled_task"));
        assert!(config.is_enabled("update"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_json(
            r#"{"collectors": ["update"], "update": {"scrape_interval": 3600}}"#,
        )
        .unwrap();
        assert!(!config.is_enabled("scheduled_task"));
        assert_eq!(config.update.scrape_interval, Duration::from_secs(3600));
        assert!(!config.update.online);
        assert_eq!(config.scheduled_task, ScheduledTaskConfig::default());
    }

    #[test]
    fn test_unknown_collector_rejected() {
        let err = Config::from_json(r#"{"collectors": ["perfdata"]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCollector(ref n) if n == "perfdata"));
        assert!(err.to_string().contains("scheduled_task"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_json(r#"{"update": {"onlin": true}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"scheduled_task": {{"include": "/Microsoft/.+"}}, "update": {{"online": true}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.scheduled_task.include, "/Microsoft/.+");
        assert_eq!(config.scheduled_task.exclude, "");
        assert!(config.update.online);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
