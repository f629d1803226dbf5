//! Batch loader for the base table

use rusqlite::{params_from_iter, Connection, Transaction};
use tracing::debug;

use super::coerce::coerce_batch;
use super::{quote_ident, table_columns, table_exists, BASE_TABLE, ROW_ID};
use crate::error::{IngestError, Result};
use crate::schema::{ColumnType, Schema};
use crate::uniprot::Entry;

/// Appends coerced batches to the base table, one transaction per batch
///
/// The table is created, inside the first batch's transaction, if the store
/// does not have it yet. An existing table is appended to only when its
/// columns match the schema.
pub struct Loader<'c> {
    conn: &'c mut Connection,
    schema: Schema,
    insert_sql: String,
    table_ready: bool,
    rows: u64,
    batches: u64,
}

impl<'c> Loader<'c> {
    pub fn new(conn: &'c mut Connection, schema: Schema) -> Self {
        let columns: Vec<String> = schema.names().map(quote_ident).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(BASE_TABLE),
            columns.join(", "),
            placeholders.join(", ")
        );

        Self {
            conn,
            schema,
            insert_sql,
            table_ready: false,
            rows: 0,
            batches: 0,
        }
    }

    /// Rows committed so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Append transactions committed so far
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Coerce and append one batch, committing it before returning
    ///
    /// Either every entry of the batch is stored or none is.
    pub fn append(&mut self, entries: &[Entry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let rows = coerce_batch(&self.schema, entries, self.rows)?;

        let tx = self.conn.transaction()?;
        if !self.table_ready {
            ensure_table(&tx, &self.schema)?;
        }
        {
            let mut stmt = tx.prepare_cached(&self.insert_sql)?;
            for row in &rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        self.table_ready = true;
        self.rows += rows.len() as u64;
        self.batches += 1;
        debug!(
            batch = self.batches,
            rows = rows.len(),
            total_rows = self.rows,
            "Committed batch"
        );

        Ok(rows.len())
    }
}

/// Create the base table from the schema, or verify an existing one matches it
fn ensure_table(tx: &Transaction<'_>, schema: &Schema) -> Result<()> {
    let expected: Vec<String> = std::iter::once(ROW_ID)
        .chain(schema.names())
        .map(str::to_string)
        .collect();

    if table_exists(tx, BASE_TABLE)? {
        let found = table_columns(tx, BASE_TABLE)?;
        if found != expected {
            return Err(IngestError::SchemaMismatch {
                table: BASE_TABLE.to_string(),
                expected: expected.join(", "),
                found: found.join(", "),
            });
        }
        debug!(table = BASE_TABLE, "Appending to existing table");
        return Ok(());
    }

    let mut definitions = vec![format!("{} INTEGER PRIMARY KEY", quote_ident(ROW_ID))];
    for column in schema.columns() {
        let name = quote_ident(&column.name);
        definitions.push(match column.ty {
            ColumnType::List(_) | ColumnType::Struct(_) => format!(
                "{} {} NOT NULL CHECK (json_valid({}))",
                name,
                column.ty.sql_type(),
                name
            ),
            _ => format!("{} {} NOT NULL", name, column.ty.sql_type()),
        });
    }

    let sql = format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(BASE_TABLE),
        definitions.join(",\n    ")
    );
    tx.execute(&sql, [])?;
    debug!(table = BASE_TABLE, columns = schema.columns().len(), "Created table");
    Ok(())
}
