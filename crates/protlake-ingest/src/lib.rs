//! Protlake Ingest Library
//!
//! Converts UniProt XML dumps into a normalized SQLite store in bounded memory.
//!
//! # Pipeline
//!
//! - **Extract**: [`uniprot::EntryExtractor`] streams one [`uniprot::Entry`] per `<entry>`
//! - **Infer**: [`schema::Schema::infer`] fixes the column schema from the first entry
//! - **Load**: [`store::Loader`] coerces and appends batches, one commit per batch
//! - **Normalize**: [`store::normalize`] builds closed-set types, dates and lookup tables
//!
//! # Example
//!
//! ```no_run
//! use protlake_ingest::{config::LoadConfig, input, pipeline, store};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let source = input::open_input(Path::new("uniprot_sprot.xml.gz"))?;
//!     let mut conn = store::open(Path::new("uniprot.sqlite"))?;
//!     let report = pipeline::convert(source, &mut conn, &LoadConfig::from_env()?)?;
//!     println!("{} rows", report.load.rows);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod uniprot;

pub use config::{InvalidRecordPolicy, LoadConfig};
pub use error::{IngestError, Result};
