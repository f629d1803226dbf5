//! SQLite target store
//!
//! - [`coerce`]: checks entries against the run's schema and encodes them as rows
//! - [`loader`]: creates the base table and appends committed batches
//! - [`normalize`]: post-load closed-set types, dates and lookup tables
//!
//! List and struct columns are stored as JSON text so they can be unnested
//! with `json_each` once loading has finished.

pub mod coerce;
pub mod loader;
pub mod normalize;

pub use coerce::{coerce_batch, coerce_entry};
pub use loader::Loader;
pub use normalize::{normalize, NormalizeReport};

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Denormalized table every entry is appended to
pub const BASE_TABLE: &str = "uniprot";

/// Store-assigned row identity of the base table, the join key of every lookup table
pub const ROW_ID: &str = "uniprot_id";

/// Open (creating if needed) the store at `path`
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    debug!(path = %path.display(), "Opened store");
    Ok(conn)
}

/// Open a private in-memory store
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

/// Quote an identifier for interpolation into SQL
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Column names of `table` in declaration order
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

pub fn row_count(conn: &Connection, table: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}
