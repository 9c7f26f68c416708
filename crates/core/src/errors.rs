use std::time::Duration;

use thiserror::Error;

/// Error taxonomy shared by every sentinel crate.
///
/// Only registration-time problems (bad ids, bad schedules, bad config) are
/// meant to be fatal. Everything raised while the system is running is either
/// recorded into a circuit breaker, logged, or converted into a result value.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid task id '{id}': {reason}")]
    InvalidTaskId { id: String, reason: String },

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("invalid schedule expression '{expr}': {message}")]
    InvalidSchedule { expr: String, message: String },

    #[error("circuit breaker is open for '{name}' - calls are blocked")]
    CircuitOpen { name: String },

    #[error("operation '{operation_id}' timed out after {timeout:?}")]
    Timeout {
        operation_id: String,
        timeout: Duration,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("publisher has been destroyed")]
    PublisherClosed,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task execution error: {0}")]
    TaskExecution(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Errors that abort registration or startup instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidTaskId { .. } | Self::InvalidSchedule { .. } | Self::Configuration(_)
        )
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let invalid = SchedulerError::InvalidTaskId {
            id: "bad id".to_string(),
            reason: "whitespace".to_string(),
        };
        assert!(invalid.is_fatal());
        assert!(!SchedulerError::transport("connection reset").is_fatal());
        assert!(!SchedulerError::PublisherClosed.is_fatal());
    }

    #[test]
    fn test_timeout_message() {
        let err = SchedulerError::Timeout {
            operation_id: "flush-1".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("flush-1"));
        assert!(err.to_string().contains("250ms"));
    }
}
