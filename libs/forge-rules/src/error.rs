//! Rule Engine Error Types

use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule engine errors
#[derive(Debug, Error)]
pub enum RuleError {
    /// Referenced Function/Field/Rule/Rule Line/Rule Group does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    /// Write blocked by an existing reference or a taken slot
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or malformed input, rejected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Underlying relational operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored value that does not decode into its domain type
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RuleError {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        RuleError::NotFound { kind, id }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        RuleError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        RuleError::Validation(msg.into())
    }

    /// Writes here are replace-on-write, so nothing is retried blindly
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<sqlx::Error> for RuleError {
    fn from(err: sqlx::Error) -> Self {
        RuleError::Storage(err.to_string())
    }
}
