//! Error types for the conversion pipeline
//!
//! Every variant names the stage that failed so the diagnostic printed by
//! the binary is enough to tell extraction, loading and normalization
//! failures apart.

use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The tokenizer cannot continue; the stream cannot be resynchronised
    #[error("Extraction failed: malformed XML near byte {position}: {message}")]
    MalformedStream { position: u64, message: String },

    /// A field the record grammar guarantees is absent
    #[error("Extraction failed: entry {entry} is missing required {field}")]
    MissingField { entry: String, field: &'static str },

    /// A record violates a structural invariant of the source grammar
    #[error("Extraction failed: entry {entry} is invalid: {reason}")]
    InvalidRecord { entry: String, reason: String },

    #[error("Schema inference failed: {0}")]
    SchemaInference(String),

    /// A row disagrees with the schema fixed at inference time
    #[error("Schema coercion failed for record {record} at '{path}': expected {expected}, found {found}")]
    Coercion {
        record: u64,
        path: String,
        expected: String,
        found: String,
    },

    #[error("Load failed: table '{table}' exists with columns [{found}], expected [{expected}]")]
    SchemaMismatch {
        table: String,
        expected: String,
        found: String,
    },

    #[error("Load failed: store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A normalization statement failed
    #[error("Normalization step '{step}' failed: {source}")]
    StoreMutation {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Normalization step '{step}' failed: row {row_id} has unparseable date '{value}'")]
    InvalidDate {
        step: &'static str,
        row_id: i64,
        value: String,
    },

    /// A pipeline stage thread stopped without reporting a result
    #[error("Pipeline failed: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] protlake_common::CommonError),
}

impl IngestError {
    /// Create a malformed stream error
    pub fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::MalformedStream {
            position,
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(entry: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            entry: entry.into(),
            field,
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Create a coercion error
    pub fn coercion(
        record: u64,
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::Coercion {
            record,
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a store error raised by a named normalization step
    pub fn mutation(step: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::StoreMutation { step, source }
    }

    /// True for errors scoped to a single record rather than the stream
    ///
    /// Only these are eligible for the skip-and-log policy.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::MissingField { .. } | Self::InvalidRecord { .. })
    }
}
