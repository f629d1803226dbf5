//! Protlake - UniProt XML to SQLite conversion tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use protlake_common::logging::{init_logging, LogConfig, LogLevel};
use protlake_ingest::uniprot::{filter_entries, DEFAULT_HGNC_ID};
use protlake_ingest::{input, pipeline, store, InvalidRecordPolicy, LoadConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "protlake")]
#[command(author, version, about = "Convert UniProt XML dumps into a normalized SQLite store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a UniProt XML dump (optionally .gz) into a store and normalize it
    Convert {
        /// UniProt XML file
        infile: PathBuf,

        /// SQLite store, created if missing
        outfile: PathBuf,

        /// Entries per committed batch after the first
        #[arg(long)]
        batch_size: Option<usize>,

        /// What to do with an entry missing a required field: abort or skip
        #[arg(long)]
        on_invalid_record: Option<InvalidRecordPolicy>,

        /// Extract on a separate thread
        #[arg(long)]
        pipelined: bool,

        /// Leave the store in its load-phase shape
        #[arg(long)]
        skip_normalize: bool,
    },

    /// Keep only the entries that reference an HGNC identifier
    Filter {
        /// UniProt XML file
        infile: PathBuf,

        /// Output XML file, `-` for stdout
        outfile: PathBuf,

        /// HGNC identifier to keep
        #[arg(long, default_value = DEFAULT_HGNC_ID)]
        hgnc: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("protlake")
        .build()
        .merge_env()
        .context("Invalid logging configuration")?;

    let _guard = init_logging(&log_config).context("Failed to initialise logging")?;

    match cli.command {
        Command::Convert {
            infile,
            outfile,
            batch_size,
            on_invalid_record,
            pipelined,
            skip_normalize,
        } => {
            let mut config = LoadConfig::from_env().context("Invalid PROTLAKE_* configuration")?;
            if let Some(batch_size) = batch_size {
                config = config.with_batch_size(batch_size);
            }
            if let Some(policy) = on_invalid_record {
                config = config.with_invalid_record_policy(policy);
            }
            if pipelined {
                config = config.with_pipelined(true);
            }
            if skip_normalize {
                config = config.with_normalize(false);
            }
            config.validate().context("Invalid command line options")?;

            convert(&infile, &outfile, &config)?;
        },
        Command::Filter {
            infile,
            outfile,
            hgnc,
        } => {
            filter(&infile, &outfile, &hgnc)?;
        },
    }

    Ok(())
}

fn convert(infile: &Path, outfile: &Path, config: &LoadConfig) -> Result<()> {
    info!(input = %infile.display(), store = %outfile.display(), "Converting");

    let source = input::open_input(infile)
        .with_context(|| format!("Failed to open input {}", infile.display()))?;
    let mut conn = store::open(outfile)
        .with_context(|| format!("Failed to open store {}", outfile.display()))?;

    let spinner = create_spinner(&format!("Loading {}", infile.display()));
    let result = pipeline::convert(spinner.wrap_read(source), &mut conn, config);
    spinner.finish_and_clear();

    let report = result.context("Conversion failed")?;
    info!(
        rows = report.load.rows,
        batches = report.load.batches,
        skipped = report.extract.skipped,
        normalized = report.normalize.is_some(),
        "Conversion complete"
    );
    if let Some(normalized) = &report.normalize {
        for (table, rows) in &normalized.tables {
            info!(table = %table, rows, "Derived table");
        }
    }
    Ok(())
}

fn filter(infile: &Path, outfile: &Path, hgnc: &str) -> Result<()> {
    let source = input::open_input(infile)
        .with_context(|| format!("Failed to open input {}", infile.display()))?;
    let sink = input::create_output(outfile)
        .with_context(|| format!("Failed to create output {}", outfile.display()))?;

    let stats = filter_entries(source, sink, hgnc).context("Filtering failed")?;
    info!(kept = stats.kept, dropped = stats.dropped, "Filter complete");
    Ok(())
}

/// Spinner showing decompressed bytes read so far
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}] {bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
