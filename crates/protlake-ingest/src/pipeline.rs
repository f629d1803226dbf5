//! Extract → infer → load → normalize
//!
//! The first entry is loaded on its own, right after it has been used to
//! infer the schema; the rest follow in batches of `batch_size`. Batches are
//! appended strictly in document order. In pipelined mode the extractor runs
//! on a scoped thread feeding a bounded queue, which keeps that order.

use crossbeam::channel;
use rusqlite::Connection;
use std::io::BufRead;
use tracing::{info, warn};

use crate::config::LoadConfig;
use crate::error::{IngestError, Result};
use crate::schema::{Schema, SchemaOverrides};
use crate::store::{normalize, Loader, NormalizeReport};
use crate::uniprot::{Entry, EntryExtractor, ExtractStats};

/// Outcome of the load phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Rows appended to the base table
    pub rows: u64,
    /// Committed append transactions, the first single-entry one included
    pub batches: u64,
}

/// Outcome of a full conversion
#[derive(Debug, Clone, Default)]
pub struct ConvertReport {
    pub load: LoadStats,
    pub extract: ExtractStats,
    /// `None` when normalization was switched off
    pub normalize: Option<NormalizeReport>,
}

/// Load `entries` into the store, inferring the schema from the first one
///
/// Stops at the first error; batches committed before it stay in the store.
pub fn load<I>(
    entries: I,
    conn: &mut Connection,
    batch_size: usize,
    overrides: &SchemaOverrides,
) -> Result<LoadStats>
where
    I: IntoIterator<Item = Result<Entry>>,
{
    if batch_size == 0 {
        return Err(IngestError::config("batch size must be at least 1"));
    }

    let mut entries = entries.into_iter();
    let first = entries.next().ok_or_else(|| {
        IngestError::SchemaInference("input contains no entries to infer a schema from".to_string())
    })??;

    let schema = Schema::infer(&first, overrides)?;
    let mut loader = Loader::new(conn, schema);
    loader.append(std::slice::from_ref(&first))?;
    drop(first);

    let mut batch = Vec::with_capacity(batch_size);
    for entry in entries {
        batch.push(entry?);
        if batch.len() == batch_size {
            loader.append(&batch)?;
            batch.clear();
        }
    }
    loader.append(&batch)?;

    Ok(LoadStats {
        rows: loader.rows(),
        batches: loader.batches(),
    })
}

/// Extract every entry of `source` and load it, sequentially or pipelined
pub fn load_source<R>(
    source: R,
    conn: &mut Connection,
    config: &LoadConfig,
) -> Result<(LoadStats, ExtractStats)>
where
    R: BufRead + Send,
{
    config.validate()?;
    let overrides = SchemaOverrides::default();
    let extractor = EntryExtractor::new(source).with_policy(config.on_invalid_record);

    if !config.pipelined {
        let mut extractor = extractor;
        let stats = load(extractor.by_ref(), conn, config.batch_size, &overrides)?;
        return Ok((stats, extractor.stats()));
    }

    std::thread::scope(|scope| {
        let (sender, receiver) = channel::bounded::<Result<Entry>>(config.queue_capacity);

        let producer = std::thread::Builder::new()
            .name("extractor".into())
            .spawn_scoped(scope, move || {
                let mut extractor = extractor;
                for item in extractor.by_ref() {
                    // The loader hung up after an error of its own
                    if sender.send(item).is_err() {
                        break;
                    }
                }
                extractor.stats()
            })?;

        let loaded = load(receiver, conn, config.batch_size, &overrides);
        let extracted = producer
            .join()
            .map_err(|_| IngestError::Pipeline("extractor thread panicked".to_string()))?;

        Ok((loaded?, extracted))
    })
}

/// Full conversion: load the source, then normalize unless disabled
pub fn convert<R>(source: R, conn: &mut Connection, config: &LoadConfig) -> Result<ConvertReport>
where
    R: BufRead + Send,
{
    info!(
        batch_size = config.batch_size,
        on_invalid_record = %config.on_invalid_record,
        pipelined = config.pipelined,
        "Starting conversion"
    );

    let (load, extract) = load_source(source, conn, config)?;
    info!(
        rows = load.rows,
        batches = load.batches,
        skipped = extract.skipped,
        "Load phase complete"
    );
    if extract.skipped > 0 {
        warn!(skipped = extract.skipped, "Invalid entries were skipped");
    }

    let normalized = if config.normalize {
        Some(normalize(conn)?)
    } else {
        info!("Skipping normalization; the store is in its load-phase shape");
        None
    };

    Ok(ConvertReport {
        load,
        extract,
        normalize: normalized,
    })
}
