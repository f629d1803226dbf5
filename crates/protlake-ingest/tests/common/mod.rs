//! Shared helpers for integration tests

#![allow(dead_code)]

use protlake_ingest::uniprot::{Entry, ProteinNames};
use rusqlite::Connection;
use std::path::PathBuf;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A valid entry whose accessions are `accessions`
pub fn entry(accessions: &[&str]) -> Entry {
    Entry {
        dataset: "Swiss-Prot".to_string(),
        created: "2001-01-01".to_string(),
        modified: "2020-02-02".to_string(),
        accessions: accessions.iter().map(|a| a.to_string()).collect(),
        names: vec![],
        protein_names: ProteinNames::default(),
        gene_names: vec![],
        subcellular_locations: vec![],
        sequence: "MSEQ".to_string(),
        hgnc_refs: vec![],
        ensembl_refs: vec![],
        proteinexistence: "evidence at protein level".to_string(),
    }
}

/// XML for one minimal entry
pub fn entry_xml(accession: &str, existence: &str, body: &str) -> String {
    format!(
        r#"<entry dataset="Swiss-Prot" created="2001-01-01" modified="2020-02-02">
  <accession>{accession}</accession>
  {body}
  <proteinExistence type="{existence}"/>
  <sequence>MSEQ</sequence>
</entry>"#
    )
}

/// Wrap entries in a UniProt document
pub fn document(entries: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<uniprot xmlns=\"http://uniprot.org/uniprot\">\n{}\n</uniprot>\n",
        entries.join("\n")
    )
}

/// Single-column query results in row order
pub fn column<T: rusqlite::types::FromSql>(conn: &Connection, sql: &str) -> Vec<T> {
    conn.prepare(sql)
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<T>, _>>()
        .unwrap()
}
