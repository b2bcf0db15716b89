//! Core error types.

use thiserror::Error;

/// Errors from the state machine engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        CoreError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Returns an error code suitable for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            CoreError::WorkerSpawn(_) => "WORKER_SPAWN",
        }
    }
}

/// Reasons an event was refused by [`FsmHandle::try_trigger`].
///
/// [`FsmHandle::try_trigger`]: crate::engine::FsmHandle::try_trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("event queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CoreError::invalid("missing initial state").error_code(),
            "INVALID_CONFIGURATION"
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "no threads");
        assert_eq!(CoreError::from(io).error_code(), "WORKER_SPAWN");
    }

    #[test]
    fn test_display() {
        let err = CoreError::invalid("event name must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid configuration: event name must not be empty"
        );
        assert_eq!(
            TriggerError::QueueFull { capacity: 8 }.to_string(),
            "event queue is full (capacity 8)"
        );
    }
}
