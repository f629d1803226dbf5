//! UniProt XML reading
//!
//! - [`extractor`]: streams `<entry>` elements into [`Entry`] values
//! - [`filter`]: copies a document keeping only entries with a given HGNC reference
//! - [`models`]: the entry data model
//! - [`tree`]: the per-entry element tree the field queries run against

pub mod extractor;
pub mod filter;
pub mod models;
pub mod tree;

pub use extractor::{EntryExtractor, ExtractStats, UNIPROT_NS};
pub use filter::{filter_entries, FilterStats, DEFAULT_HGNC_ID};
pub use models::{EnsemblRef, Entry, ProteinNames};
