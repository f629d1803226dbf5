//! Error types shared across protlake crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while reading settings or installing the log subscriber
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommonError {
    /// Create an invalid value error
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a logging setup error
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }
}
