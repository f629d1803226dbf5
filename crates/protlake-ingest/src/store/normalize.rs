//! Post-load normalization
//!
//! Runs once, after every batch is committed, as a fixed sequence of steps
//! against the complete base table:
//!
//! 1. `dataset` becomes a closed-set type (`dataset_type`)
//! 2. `proteinexistence` becomes a closed-set type (`proteinexistence_type`)
//! 3. `created`/`modified` are parsed into `created_date`/`modified_date` and dropped
//! 4. `primary_accession` is derived from the first accession
//! 5. `subcellular_location_type` and `uniprot_subcellular_location_lut`
//! 6. lookup tables for accessions, names, gene names and HGNC references
//! 7. `uniprot_ensembl_ref_lut` with one flat row per Ensembl reference
//!
//! Steps 1-4 mutate the base table; 5-7 read it. Each step runs in its own
//! transaction and is committed before the next one starts.
//!
//! A closed-set type `<name>_type` is a table of `(code, value)` pairs holding
//! exactly the distinct observed values, coded in ascending value order. A
//! column converted to a closed-set type keeps its name and holds codes.
//! Creating a type that already exists fails the step.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

use super::{quote_ident, row_count, BASE_TABLE, ROW_ID};
use crate::error::{IngestError, Result};

/// Format of `created` and `modified` in the source
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Step names, in execution order
pub const STEPS: [&str; 7] = [
    "dataset_type",
    "proteinexistence_type",
    "dates",
    "primary_accession",
    "subcellular_location_lut",
    "list_luts",
    "ensembl_ref_lut",
];

/// List column, lookup table and its value column for step 6
const LIST_LUTS: [(&str, &str, &str); 4] = [
    ("accessions", "uniprot_accession_lut", "accession"),
    ("names", "uniprot_name_lut", "name"),
    ("gene_names", "uniprot_gene_name_lut", "gene_name"),
    ("hgnc_refs", "uniprot_hgnc_ref_lut", "hgnc_ref"),
];

/// Tables created by a normalizer run and their row counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub tables: Vec<(String, u64)>,
}

impl NormalizeReport {
    pub fn rows(&self, table: &str) -> Option<u64> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
    }
}

/// Run every normalization step against the loaded base table
pub fn normalize(conn: &mut Connection) -> Result<NormalizeReport> {
    let mut report = NormalizeReport::default();

    run_step(conn, STEPS[0], |tx, step| {
        closed_set_column(tx, step, "dataset", "dataset_type")
    })?;
    run_step(conn, STEPS[1], |tx, step| {
        closed_set_column(tx, step, "proteinexistence", "proteinexistence_type")
    })?;
    run_step(conn, STEPS[2], convert_dates)?;
    run_step(conn, STEPS[3], derive_primary_accession)?;
    run_step(conn, STEPS[4], subcellular_location_lut)?;
    run_step(conn, STEPS[5], |tx, step| {
        for (source, table, column) in LIST_LUTS {
            list_lut(tx, step, source, table, column)?;
        }
        Ok(())
    })?;
    run_step(conn, STEPS[6], ensembl_ref_lut)?;

    let mut tables = vec![
        "dataset_type",
        "proteinexistence_type",
        "subcellular_location_type",
        "uniprot_subcellular_location_lut",
    ];
    tables.extend(LIST_LUTS.iter().map(|(_, table, _)| *table));
    tables.push("uniprot_ensembl_ref_lut");
    for table in tables {
        report.tables.push((table.to_string(), row_count(conn, table)?));
    }

    info!(tables = report.tables.len(), "Normalization complete");
    Ok(report)
}

fn run_step<F>(conn: &mut Connection, step: &'static str, body: F) -> Result<()>
where
    F: FnOnce(&Transaction<'_>, &'static str) -> Result<()>,
{
    debug!(step, "Running normalization step");
    let tx = conn.transaction().map_err(IngestError::mutation(step))?;
    body(&tx, step)?;
    tx.commit().map_err(IngestError::mutation(step))?;
    info!(step, "Normalization step committed");
    Ok(())
}

fn exec(tx: &Transaction<'_>, step: &'static str, sql: &str) -> Result<usize> {
    tx.execute(sql, []).map_err(IngestError::mutation(step))
}

/// Create `type_table` holding the distinct values produced by `values_sql`
fn create_closed_set_type(
    tx: &Transaction<'_>,
    step: &'static str,
    type_table: &str,
    values_sql: &str,
) -> Result<()> {
    let type_table = quote_ident(type_table);
    exec(
        tx,
        step,
        &format!(
            "CREATE TABLE {} (code INTEGER PRIMARY KEY, value TEXT NOT NULL UNIQUE)",
            type_table
        ),
    )?;
    let values = exec(
        tx,
        step,
        &format!(
            "INSERT INTO {} (value) SELECT DISTINCT value FROM ({}) WHERE value IS NOT NULL ORDER BY value",
            type_table, values_sql
        ),
    )?;
    debug!(step, type_table = %type_table, values, "Created closed-set type");
    Ok(())
}

/// Replace a text column of the base table with codes into a new closed-set type
fn closed_set_column(
    tx: &Transaction<'_>,
    step: &'static str,
    column: &str,
    type_table: &str,
) -> Result<()> {
    let base = quote_ident(BASE_TABLE);
    let quoted = quote_ident(column);
    let coded = quote_ident(&format!("{}__code", column));

    create_closed_set_type(
        tx,
        step,
        type_table,
        &format!("SELECT {} AS value FROM {}", quoted, base),
    )?;

    let type_table = quote_ident(type_table);
    exec(
        tx,
        step,
        &format!(
            "ALTER TABLE {} ADD COLUMN {} INTEGER REFERENCES {}(code)",
            base, coded, type_table
        ),
    )?;
    exec(
        tx,
        step,
        &format!(
            "UPDATE {base} SET {coded} = (SELECT code FROM {ty} WHERE {ty}.value = {base}.{quoted})",
            base = base,
            coded = coded,
            ty = type_table,
            quoted = quoted
        ),
    )?;
    exec(tx, step, &format!("ALTER TABLE {} DROP COLUMN {}", base, quoted))?;
    exec(
        tx,
        step,
        &format!("ALTER TABLE {} RENAME COLUMN {} TO {}", base, coded, quoted),
    )?;
    Ok(())
}

fn parse_date(step: &'static str, row_id: i64, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| IngestError::InvalidDate {
        step,
        row_id,
        value: value.to_string(),
    })
}

fn convert_dates(tx: &Transaction<'_>, step: &'static str) -> Result<()> {
    let base = quote_ident(BASE_TABLE);
    exec(tx, step, &format!("ALTER TABLE {} ADD COLUMN created_date DATE", base))?;
    exec(tx, step, &format!("ALTER TABLE {} ADD COLUMN modified_date DATE", base))?;

    {
        let mut select = tx
            .prepare(&format!(
                "SELECT {}, created, modified FROM {} ORDER BY {}",
                quote_ident(ROW_ID),
                base,
                quote_ident(ROW_ID)
            ))
            .map_err(IngestError::mutation(step))?;
        let mut update = tx
            .prepare(&format!(
                "UPDATE {} SET created_date = ?1, modified_date = ?2 WHERE {} = ?3",
                base,
                quote_ident(ROW_ID)
            ))
            .map_err(IngestError::mutation(step))?;

        let mut rows = select.query([]).map_err(IngestError::mutation(step))?;
        while let Some(row) = rows.next().map_err(IngestError::mutation(step))? {
            let row_id: i64 = row.get(0).map_err(IngestError::mutation(step))?;
            let created: String = row.get(1).map_err(IngestError::mutation(step))?;
            let modified: String = row.get(2).map_err(IngestError::mutation(step))?;

            let created = parse_date(step, row_id, &created)?;
            let modified = parse_date(step, row_id, &modified)?;
            update
                .execute(params![created, modified, row_id])
                .map_err(IngestError::mutation(step))?;
        }
    }

    exec(tx, step, &format!("ALTER TABLE {} DROP COLUMN created", base))?;
    exec(tx, step, &format!("ALTER TABLE {} DROP COLUMN modified", base))?;
    Ok(())
}

fn derive_primary_accession(tx: &Transaction<'_>, step: &'static str) -> Result<()> {
    let base = quote_ident(BASE_TABLE);
    exec(tx, step, &format!("ALTER TABLE {} ADD COLUMN primary_accession TEXT", base))?;
    exec(
        tx,
        step,
        &format!(
            "UPDATE {} SET primary_accession = json_extract(accessions, '$[0]')",
            base
        ),
    )?;
    Ok(())
}

/// `CREATE TABLE` for a lookup table keyed by the base row identity
fn create_lut(
    tx: &Transaction<'_>,
    step: &'static str,
    table: &str,
    columns: &[String],
) -> Result<()> {
    exec(
        tx,
        step,
        &format!(
            "CREATE TABLE {} ({} INTEGER NOT NULL REFERENCES {}({}), {})",
            quote_ident(table),
            quote_ident(ROW_ID),
            quote_ident(BASE_TABLE),
            quote_ident(ROW_ID),
            columns.join(", ")
        ),
    )?;
    Ok(())
}

fn index_lut(tx: &Transaction<'_>, step: &'static str, table: &str, rows: usize) -> Result<()> {
    exec(
        tx,
        step,
        &format!(
            "CREATE INDEX {} ON {} ({})",
            quote_ident(&format!("idx_{}_{}", table, ROW_ID)),
            quote_ident(table),
            quote_ident(ROW_ID)
        ),
    )?;
    debug!(step, table, rows, "Built lookup table");
    Ok(())
}

fn subcellular_location_lut(tx: &Transaction<'_>, step: &'static str) -> Result<()> {
    let base = quote_ident(BASE_TABLE);
    let table = "uniprot_subcellular_location_lut";

    create_closed_set_type(
        tx,
        step,
        "subcellular_location_type",
        &format!(
            "SELECT j.value AS value FROM {}, json_each({}.subcellular_locations) AS j",
            base, base
        ),
    )?;
    create_lut(
        tx,
        step,
        table,
        &["subcellular_location INTEGER NOT NULL REFERENCES subcellular_location_type(code)"
            .to_string()],
    )?;
    let rows = exec(
        tx,
        step,
        &format!(
            "INSERT INTO {lut} ({id}, subcellular_location) \
             SELECT u.{id}, t.code FROM {base} AS u, json_each(u.subcellular_locations) AS j \
             JOIN subcellular_location_type AS t ON t.value = j.value \
             ORDER BY u.{id}, j.key",
            lut = quote_ident(table),
            id = quote_ident(ROW_ID),
            base = base
        ),
    )?;
    index_lut(tx, step, table, rows)
}

fn list_lut(
    tx: &Transaction<'_>,
    step: &'static str,
    source: &str,
    table: &str,
    column: &str,
) -> Result<()> {
    create_lut(
        tx,
        step,
        table,
        &[format!("{} TEXT NOT NULL", quote_ident(column))],
    )?;
    let rows = exec(
        tx,
        step,
        &format!(
            "INSERT INTO {lut} ({id}, {col}) \
             SELECT u.{id}, j.value FROM {base} AS u, json_each(u.{src}) AS j \
             ORDER BY u.{id}, j.key",
            lut = quote_ident(table),
            id = quote_ident(ROW_ID),
            col = quote_ident(column),
            base = quote_ident(BASE_TABLE),
            src = quote_ident(source)
        ),
    )?;
    index_lut(tx, step, table, rows)
}

fn ensembl_ref_lut(tx: &Transaction<'_>, step: &'static str) -> Result<()> {
    let table = "uniprot_ensembl_ref_lut";

    create_lut(
        tx,
        step,
        table,
        &[
            "tid TEXT NOT NULL".to_string(),
            "pid TEXT NOT NULL".to_string(),
            "gid TEXT NOT NULL".to_string(),
        ],
    )?;
    let rows = exec(
        tx,
        step,
        &format!(
            "INSERT INTO {lut} ({id}, tid, pid, gid) \
             SELECT u.{id}, json_extract(j.value, '$.tid'), json_extract(j.value, '$.pid'), \
                    json_extract(j.value, '$.gid') \
             FROM {base} AS u, json_each(u.ensembl_refs) AS j \
             ORDER BY u.{id}, j.key",
            lut = quote_ident(table),
            id = quote_ident(ROW_ID),
            base = quote_ident(BASE_TABLE)
        ),
    )?;
    index_lut(tx, step, table, rows)
}
