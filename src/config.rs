//! Demo configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via MINIFSM_CONFIG or --config)
//! 3. Environment variables
//! 4. Command-line flags

use minifsm_core::{EngineConfig, ShutdownMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Producer workload.
    pub demo: DemoConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("MINIFSM_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        apply_engine_env_overrides(&mut self.engine);
        self.demo.apply_env_overrides();
    }

    /// Validates the whole configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if self.demo.producers == 0 {
            return Err(ConfigError::Validation(
                "demo.producers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn apply_engine_env_overrides(engine: &mut EngineConfig) {
    if let Ok(name) = std::env::var("MINIFSM_WORKER_NAME") {
        if !name.is_empty() {
            engine.worker_name = name;
        }
    }

    if let Ok(capacity) = std::env::var("MINIFSM_QUEUE_CAPACITY") {
        if let Ok(n) = capacity.parse() {
            engine.queue_capacity = n;
        }
    }

    if let Ok(mode) = std::env::var("MINIFSM_SHUTDOWN_MODE") {
        if let Some(mode) = parse_shutdown_mode(&mode) {
            engine.shutdown_mode = mode;
        }
    }
}

/// Parses `immediate` or `graceful` (case-insensitive).
pub fn parse_shutdown_mode(s: &str) -> Option<ShutdownMode> {
    match s.trim().to_lowercase().as_str() {
        "immediate" => Some(ShutdownMode::Immediate),
        "graceful" => Some(ShutdownMode::Graceful),
        _ => None,
    }
}

/// Producer workload for the demo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of producer threads.
    pub producers: usize,
    /// Iterations each producer runs.
    pub rounds: usize,
    /// Pause between triggers, in milliseconds.
    pub step_delay_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            producers: 5,
            rounds: 3,
            step_delay_ms: 10,
        }
    }
}

impl DemoConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(producers) = std::env::var("MINIFSM_PRODUCERS") {
            if let Ok(n) = producers.parse() {
                self.producers = n;
            }
        }

        if let Ok(rounds) = std::env::var("MINIFSM_ROUNDS") {
            if let Ok(n) = rounds.parse() {
                self.rounds = n;
            }
        }

        if let Ok(delay) = std::env::var("MINIFSM_STEP_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.step_delay_ms = ms;
            }
        }
    }

    /// Returns the step delay as Duration.
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.demo.producers, 5);
        assert_eq!(config.demo.rounds, 3);
        assert_eq!(config.demo.step_delay(), Duration::from_millis(10));
        assert_eq!(config.engine.shutdown_mode, ShutdownMode::Immediate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "engine:\n  queue_capacity: 64\n  shutdown_mode: graceful\ndemo:\n  producers: 2"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.engine.queue_capacity, 64);
        assert_eq!(config.engine.shutdown_mode, ShutdownMode::Graceful);
        assert_eq!(config.demo.producers, 2);
        // Unset fields keep their defaults
        assert_eq!(config.demo.rounds, 3);
        assert_eq!(config.engine.worker_name, "minifsm-worker");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(..))));
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "demo: [not, a, map]").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(..))));
    }

    #[test]
    fn test_validate_rejects_zero_producers() {
        let mut config = Config::default();
        config.demo.producers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_shutdown_mode() {
        assert_eq!(parse_shutdown_mode("Graceful"), Some(ShutdownMode::Graceful));
        assert_eq!(parse_shutdown_mode(" immediate "), Some(ShutdownMode::Immediate));
        assert_eq!(parse_shutdown_mode("later"), None);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.engine, config.engine);
        assert_eq!(parsed.demo, config.demo);
    }
}
