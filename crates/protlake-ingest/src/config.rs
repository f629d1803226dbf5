//! Conversion run configuration

use crate::error::{IngestError, Result};
use protlake_common::env;
use serde::{Deserialize, Serialize};

/// Rows appended per store transaction after the first (inference) record
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Entries buffered between the extractor thread and the loader when pipelined
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// What to do with a record that is missing a required field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRecordPolicy {
    /// Stop the whole run at the first invalid record
    #[default]
    Abort,
    /// Log the record, count it and carry on with the next one
    Skip,
}

impl std::str::FromStr for InvalidRecordPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(IngestError::config(format!(
                "invalid record policy '{}': expected abort or skip",
                s
            ))),
        }
    }
}

impl std::fmt::Display for InvalidRecordPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Settings for one conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Entries per append after the first
    pub batch_size: usize,

    pub on_invalid_record: InvalidRecordPolicy,

    /// Run extraction on its own thread feeding a bounded queue
    pub pipelined: bool,

    /// Bound of the extraction queue in pipelined mode
    pub queue_capacity: usize,

    /// Run the post-load normalizer once loading completes
    pub normalize: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            on_invalid_record: InvalidRecordPolicy::Abort,
            pipelined: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            normalize: true,
        }
    }
}

impl LoadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// - `PROTLAKE_BATCH_SIZE`
    /// - `PROTLAKE_ON_INVALID_RECORD` (abort, skip)
    /// - `PROTLAKE_PIPELINED`
    /// - `PROTLAKE_QUEUE_CAPACITY`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(size) = env::parse("PROTLAKE_BATCH_SIZE", "a positive integer")? {
            config.batch_size = size;
        }
        if let Some(policy) = env::var("PROTLAKE_ON_INVALID_RECORD") {
            config.on_invalid_record = policy.parse()?;
        }
        if let Some(pipelined) = env::flag("PROTLAKE_PIPELINED")? {
            config.pipelined = pipelined;
        }
        if let Some(capacity) = env::parse("PROTLAKE_QUEUE_CAPACITY", "a positive integer")? {
            config.queue_capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_invalid_record_policy(mut self, policy: InvalidRecordPolicy) -> Self {
        self.on_invalid_record = policy;
        self
    }

    pub fn with_pipelined(mut self, pipelined: bool) -> Self {
        self.pipelined = pipelined;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::config("batch size must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(IngestError::config("queue capacity must be at least 1"));
        }
        Ok(())
    }
}
