//! Input and output streams for the command line
//!
//! `.gz` inputs are decompressed transparently. UniProt publishes its dumps
//! gzipped, so this is the common path.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::error::Result;

const READ_BUFFER: usize = 1 << 20;

/// Whether `path` names a gzip file, judged by extension
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open `path` for buffered reading, decompressing `.gz` files
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;

    if is_gzip(path) {
        debug!(path = %path.display(), "Opening gzip input");
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER,
            MultiGzDecoder::new(file),
        )))
    } else {
        debug!(path = %path.display(), "Opening plain input");
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, file)))
    }
}

/// Create `path` for buffered writing; `-` is standard output
pub fn create_output(path: &Path) -> Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    Ok(Box::new(BufWriter::new(File::create(path)?)))
}
