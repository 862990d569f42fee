//! Error types for statement generation
//!
//! Every builder fails fast with one of these variants. None of them is
//! retryable: the builder performs no I/O, so the same input always fails
//! the same way.

use thiserror::Error;

/// Result type alias for statement-building operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Error types for statement-building operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Entity metadata or values are unusable (missing table, key, etc.)
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// Filter descriptor is malformed or out of range
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The selected dialect cannot express the requested statement
    #[error("Operation '{operation}' is not supported by the {dialect} dialect")]
    UnsupportedOperation {
        dialect: String,
        operation: String,
    },

    /// An encrypted field was used without key/certificate configuration
    #[error("Encryption configuration missing: {0}")]
    EncryptionConfigMissing(String),
}

impl QueryError {
    pub(crate) fn invalid_entity(msg: impl Into<String>) -> Self {
        QueryError::InvalidEntity(msg.into())
    }

    pub(crate) fn invalid_filter(msg: impl Into<String>) -> Self {
        QueryError::InvalidFilter(msg.into())
    }

    pub(crate) fn unsupported(dialect: &str, operation: &str) -> Self {
        QueryError::UnsupportedOperation {
            dialect: dialect.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Short machine-readable kind, used in log events
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::InvalidEntity(_) => "invalid_entity",
            QueryError::InvalidFilter(_) => "invalid_filter",
            QueryError::UnsupportedOperation { .. } => "unsupported_operation",
            QueryError::EncryptionConfigMissing(_) => "encryption_config_missing",
        }
    }
}
