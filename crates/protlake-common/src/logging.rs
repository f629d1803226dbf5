//! Logging configuration and initialization
//!
//! All protlake binaries log through `tracing`. Console output goes to
//! stderr because stdout may be carrying XML (see `protlake filter -`).
//!
//! Use structured fields rather than formatted strings:
//!
//! ```rust
//! use tracing::info;
//!
//! let rows = 25;
//! info!(rows, table = "uniprot", "Committed batch");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use protlake_common::logging::{init_logging, LogConfig};
//!
//! # fn main() -> protlake_common::Result<()> {
//! let config = LogConfig::from_env()?;
//! let _guard = init_logging(&config)?;
//! # Ok(())
//! # }
//! ```

use crate::env;
use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(CommonError::invalid_value(
                "log level",
                s,
                "trace, debug, info, warn or error",
            )),
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// stderr only
    #[default]
    Console,
    /// Daily rotating file only
    File,
    Both,
}

impl LogOutput {
    fn includes_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn includes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl std::str::FromStr for LogOutput {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(CommonError::invalid_value(
                "log output",
                s,
                "console, file or both",
            )),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(CommonError::invalid_value("log format", s, "text or json")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,

    /// Directory for rotated log files (only used when output includes file)
    pub log_dir: PathBuf,

    /// Log file name prefix, e.g. "protlake" -> "protlake.2024-01-18"
    pub log_file_prefix: String,

    /// Extra filter directives such as "rusqlite=warn"
    pub filter_directives: Option<String>,

    pub include_location: bool,
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "protlake".to_string(),
            filter_directives: None,
            include_location: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`: directory for log files
    /// - `LOG_FILE_PREFIX`: prefix for log files
    /// - `LOG_FILTER`: additional comma separated filter directives
    /// - `LOG_INCLUDE_LOCATION`: include file/line in logs
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Overlay any `LOG_*` variables that are set onto this configuration
    pub fn merge_env(mut self) -> Result<Self> {
        if let Some(level) = env::var("LOG_LEVEL") {
            self.level = level.parse()?;
        }
        if let Some(output) = env::var("LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Some(format) = env::var("LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(dir) = env::var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = env::var("LOG_FILE_PREFIX") {
            self.log_file_prefix = prefix;
        }
        if let Some(filter) = env::var("LOG_FILTER") {
            self.filter_directives = Some(filter);
        }
        if let Some(location) = env::flag("LOG_INCLUDE_LOCATION")? {
            self.include_location = location;
        }
        Ok(self)
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Keeps the background file writer alive; drop it last to flush buffered lines
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global tracing subscriber
///
/// Call once at startup and hold the returned guard until exit.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let filter = build_filter(config)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;

    if config.output.includes_console() {
        layers.push(fmt_layer(config, std::io::stderr, true));
    }

    if config.output.includes_file() {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender =
            tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(config, writer, false));
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| CommonError::logging(e.to_string()))?;

    Ok(LogGuard { _file: file_guard })
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let parsed = directive
                .parse()
                .map_err(|_| CommonError::invalid_value("LOG_FILTER", directive, "a directive"))?;
            filter = filter.add_directive(parsed);
        }
    }

    Ok(filter)
}

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(config.include_targets)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}
