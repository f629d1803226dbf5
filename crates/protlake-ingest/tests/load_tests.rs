//! Integration tests for loading and normalizing into SQLite

mod common;

use common::{column, document, entry, entry_xml, fixture_path};
use proptest::prelude::*;
use protlake_ingest::input::open_input;
use protlake_ingest::pipeline::{convert, load};
use protlake_ingest::schema::SchemaOverrides;
use protlake_ingest::store::{self, normalize, row_count, table_columns, BASE_TABLE};
use protlake_ingest::{IngestError, LoadConfig};
use std::collections::BTreeSet;

// ============================================================================
// Full conversion of the sample file
// ============================================================================

#[test]
fn test_convert_sample_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = store::open(&dir.path().join("uniprot.sqlite")).unwrap();
    let source = open_input(&fixture_path("uniprot_sample.xml")).unwrap();

    let report = convert(source, &mut conn, &LoadConfig::new()).unwrap();
    assert_eq!(report.load.rows, 3);
    assert_eq!(report.load.batches, 2);

    let normalized = report.normalize.unwrap();
    assert_eq!(normalized.rows("uniprot_accession_lut"), Some(5));
    assert_eq!(normalized.rows("uniprot_gene_name_lut"), Some(4));
    assert_eq!(normalized.rows("uniprot_hgnc_ref_lut"), Some(2));
    assert_eq!(normalized.rows("uniprot_ensembl_ref_lut"), Some(3));
    assert_eq!(normalized.rows("uniprot_subcellular_location_lut"), Some(3));
    assert_eq!(normalized.rows("subcellular_location_type"), Some(2));

    let primary: Vec<String> = column(&conn, "SELECT primary_accession FROM uniprot ORDER BY uniprot_id");
    assert_eq!(primary, vec!["P01375", "P01308", "A0A024R161"]);

    let datasets: Vec<String> = column(&conn, "SELECT value FROM dataset_type ORDER BY code");
    assert_eq!(datasets, vec!["Swiss-Prot", "TrEMBL"]);

    let columns = table_columns(&conn, BASE_TABLE).unwrap();
    assert_eq!(
        columns,
        vec![
            "uniprot_id",
            "accessions",
            "names",
            "protein_names",
            "gene_names",
            "subcellular_locations",
            "sequence",
            "hgnc_refs",
            "ensembl_refs",
            "dataset",
            "proteinexistence",
            "created_date",
            "modified_date",
            "primary_accession",
        ]
    );
}

// ============================================================================
// Normalization properties
// ============================================================================

#[test]
fn test_enum_completeness() {
    let xml = document(&[
        entry_xml("P1", "evidence at protein level", ""),
        entry_xml("P2", "predicted", ""),
        entry_xml("P3", "uncertain", ""),
        entry_xml("P4", "predicted", ""),
    ]);
    let mut conn = store::open_in_memory().unwrap();
    convert(xml.as_bytes(), &mut conn, &LoadConfig::new().with_batch_size(2)).unwrap();

    let values: BTreeSet<String> =
        column::<String>(&conn, "SELECT value FROM proteinexistence_type").into_iter().collect();
    let expected: BTreeSet<String> = ["evidence at protein level", "predicted", "uncertain"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(values, expected);
    assert_eq!(row_count(&conn, "proteinexistence_type").unwrap(), 3);
}

#[test]
fn test_date_conversion() {
    let xml = document(&[entry_xml("P1", "predicted", "")
        .replace(r#"created="2001-01-01""#, r#"created="1999-12-31""#)]);
    let mut conn = store::open_in_memory().unwrap();
    convert(xml.as_bytes(), &mut conn, &LoadConfig::new()).unwrap();

    let created: Vec<chrono::NaiveDate> = column(&conn, "SELECT created_date FROM uniprot");
    assert_eq!(created, vec![chrono::NaiveDate::from_ymd_opt(1999, 12, 31).unwrap()]);

    let columns = table_columns(&conn, BASE_TABLE).unwrap();
    assert!(!columns.iter().any(|c| c == "created"));
    assert!(!columns.iter().any(|c| c == "modified"));
}

#[test]
fn test_primary_accession_is_first_accession() {
    let mut conn = store::open_in_memory().unwrap();
    load(
        vec![Ok(entry(&["P1", "P2"]))],
        &mut conn,
        25,
        &SchemaOverrides::default(),
    )
    .unwrap();
    normalize(&mut conn).unwrap();

    let primary: Vec<String> = column(&conn, "SELECT primary_accession FROM uniprot");
    assert_eq!(primary, vec!["P1"]);
}

#[test]
fn test_empty_subcellular_locations_contribute_nothing() {
    let mut located = entry(&["P1"]);
    located.subcellular_locations = vec!["Nucleus".to_string()];
    let unlocated = entry(&["P2"]);

    let mut conn = store::open_in_memory().unwrap();
    load(
        vec![Ok(unlocated), Ok(located)],
        &mut conn,
        25,
        &SchemaOverrides::default(),
    )
    .unwrap();
    normalize(&mut conn).unwrap();

    let owners: Vec<i64> = column(&conn, "SELECT uniprot_id FROM uniprot_subcellular_location_lut");
    assert_eq!(owners, vec![2]);
    let values: Vec<String> = column(&conn, "SELECT value FROM subcellular_location_type");
    assert_eq!(values, vec!["Nucleus"]);
}

#[test]
fn test_all_empty_locations_give_empty_type() {
    let mut conn = store::open_in_memory().unwrap();
    load(vec![Ok(entry(&["P1"]))], &mut conn, 25, &SchemaOverrides::default()).unwrap();
    let report = normalize(&mut conn).unwrap();

    assert_eq!(report.rows("subcellular_location_type"), Some(0));
    assert_eq!(report.rows("uniprot_subcellular_location_lut"), Some(0));
}

#[test]
fn test_rerun_on_normalized_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("uniprot.sqlite");
    let xml = document(&[entry_xml("P1", "predicted", "")]);

    let mut conn = store::open(&path).unwrap();
    convert(xml.as_bytes(), &mut conn, &LoadConfig::new()).unwrap();

    let err = convert(xml.as_bytes(), &mut conn, &LoadConfig::new()).unwrap_err();
    assert!(matches!(err, IngestError::SchemaMismatch { .. }));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_accession_lut_preserves_cardinality(lengths in prop::collection::vec(0usize..5, 1..20)) {
        let entries: Vec<_> = lengths
            .iter()
            .enumerate()
            .map(|(i, len)| {
                let accessions: Vec<String> = (0..*len).map(|j| format!("A{}_{}", i, j)).collect();
                let refs: Vec<&str> = accessions.iter().map(String::as_str).collect();
                Ok::<_, IngestError>(entry(&refs))
            })
            .collect();

        let mut conn = store::open_in_memory().unwrap();
        load(entries, &mut conn, 4, &SchemaOverrides::default()).unwrap();
        normalize(&mut conn).unwrap();

        let total: usize = lengths.iter().sum();
        prop_assert_eq!(row_count(&conn, "uniprot_accession_lut").unwrap(), total as u64);

        let grouped: Vec<i64> = column(
            &conn,
            "SELECT (SELECT COUNT(*) FROM uniprot_accession_lut AS l WHERE l.uniprot_id = u.uniprot_id) \
             FROM uniprot AS u ORDER BY u.uniprot_id",
        );
        let expected: Vec<i64> = lengths.iter().map(|l| *l as i64).collect();
        prop_assert_eq!(grouped, expected);

        // Within an owner, lookup rows keep list order
        let first_owner: Vec<String> = column(
            &conn,
            "SELECT accession FROM uniprot_accession_lut WHERE uniprot_id = 1 ORDER BY rowid",
        );
        let expected_first: Vec<String> = (0..lengths[0]).map(|j| format!("A0_{}", j)).collect();
        prop_assert_eq!(first_owner, expected_first);
    }

    #[test]
    fn prop_row_count_independent_of_batch_size(
        k in 0usize..4,
        r in 0usize..25,
        batch_size in 1usize..40,
    ) {
        let count = 1 + 25 * k + r;
        let entries = (0..count).map(|i| Ok::<_, IngestError>(entry(&[&format!("P{}", i)])));

        let mut conn = store::open_in_memory().unwrap();
        let stats = load(entries, &mut conn, batch_size, &SchemaOverrides::default()).unwrap();

        prop_assert_eq!(stats.rows, count as u64);
        prop_assert_eq!(row_count(&conn, BASE_TABLE).unwrap(), count as u64);
        let expected_batches = 1 + (count - 1).div_ceil(batch_size);
        prop_assert_eq!(stats.batches, expected_batches as u64);
    }
}
