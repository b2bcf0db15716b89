//! Engine configuration.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Default name given to the dispatch worker thread.
pub const DEFAULT_WORKER_NAME: &str = "minifsm-worker";

/// What the worker does with events still queued when shutdown is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Stop after the in-flight dispatch; queued events are dropped.
    #[default]
    Immediate,
    /// Dispatch every event already queued, then stop.
    Graceful,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the worker thread.
    pub worker_name: String,
    /// Maximum number of pending events (0 = unbounded).
    pub queue_capacity: usize,
    /// Shutdown behavior for pending events.
    pub shutdown_mode: ShutdownMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            queue_capacity: 0, // unbounded
            shutdown_mode: ShutdownMode::default(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker thread name.
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Bounds the event queue; 0 means unbounded.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets what happens to queued events on shutdown.
    pub fn with_shutdown_mode(mut self, mode: ShutdownMode) -> Self {
        self.shutdown_mode = mode;
        self
    }

    /// Returns the queue bound, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }

    /// Checks the configuration before any thread is spawned.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.worker_name.trim().is_empty() {
            return Err(CoreError::invalid("worker_name must not be empty"));
        }
        // Thread names cannot carry interior NULs.
        if self.worker_name.contains('\0') {
            return Err(CoreError::invalid("worker_name must not contain NUL"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.worker_name, DEFAULT_WORKER_NAME);
        assert_eq!(config.capacity(), None);
        assert_eq!(config.shutdown_mode, ShutdownMode::Immediate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new()
            .with_worker_name("door-fsm")
            .with_queue_capacity(16)
            .with_shutdown_mode(ShutdownMode::Graceful);

        assert_eq!(config.worker_name, "door-fsm");
        assert_eq!(config.capacity(), Some(16));
        assert_eq!(config.shutdown_mode, ShutdownMode::Graceful);
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let config = EngineConfig::new().with_worker_name("  ");
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfiguration { .. })
        ));

        let config = EngineConfig::new().with_worker_name("bad\0name");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"shutdown_mode": "graceful"}"#).unwrap();
        assert_eq!(config.shutdown_mode, ShutdownMode::Graceful);
        assert_eq!(config.worker_name, DEFAULT_WORKER_NAME);
        assert_eq!(config.queue_capacity, 0);
    }
}
