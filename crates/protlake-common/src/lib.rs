//! protlake common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ambient pieces shared by the protlake workspace members:
//!
//! - **Error Handling**: the configuration error type and result alias
//! - **Environment**: typed lookups of `KEY=value` settings
//! - **Logging**: `tracing` subscriber initialisation
//!
//! # Example
//!
//! ```no_run
//! use protlake_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> protlake_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
