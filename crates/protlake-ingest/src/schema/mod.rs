//! Column schema inference
//!
//! The base table's schema is derived once per run from a single sample
//! entry and then handed, unchanged, to every coercion and append. Inference
//! is structural over the sample's JSON shape: strings become text, arrays
//! become lists of their element type and objects become structs.
//!
//! An empty array in the sample says nothing about its element type, so the
//! result is corrected by a declarative [`SchemaOverrides`] table mapping
//! field paths to forced types. Inference fails if any column is still
//! untyped after the overrides are applied.

use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::uniprot::Entry;

/// Type of a column or of a struct field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    List(Box<ColumnType>),
    Struct(Vec<Column>),
    /// Element type of a list that was empty in the sample
    Unknown,
}

impl ColumnType {
    pub fn list_of(element: ColumnType) -> Self {
        Self::List(Box::new(element))
    }

    /// Struct of text fields
    pub fn text_struct(fields: &[&str]) -> Self {
        Self::Struct(
            fields
                .iter()
                .map(|name| Column::new(*name, ColumnType::Text))
                .collect(),
        )
    }

    /// Declared SQLite column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Unknown => "TEXT",
            Self::List(_) | Self::Struct(_) => "JSON",
        }
    }

    fn is_fully_typed(&self) -> bool {
        match self {
            Self::Text => true,
            Self::Unknown => false,
            Self::List(element) => element.is_fully_typed(),
            Self::Struct(fields) => fields.iter().all(|f| f.ty.is_fully_typed()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
            Self::List(element) => write!(f, "list<{}>", element),
            Self::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// A named column, or a named field of a struct column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Fixed, ordered column set of the base table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Infer the schema from one sample entry, then apply `overrides`
    pub fn infer(sample: &Entry, overrides: &SchemaOverrides) -> Result<Self> {
        let value = serde_json::to_value(sample)
            .map_err(|e| IngestError::SchemaInference(e.to_string()))?;
        Self::infer_from_value(&value, overrides)
    }

    /// Infer the schema from a JSON object whose keys become columns
    pub fn infer_from_value(sample: &Value, overrides: &SchemaOverrides) -> Result<Self> {
        let Value::Object(fields) = sample else {
            return Err(IngestError::SchemaInference(format!(
                "sample must be an object, found {}",
                json_kind(sample)
            )));
        };

        let mut columns = fields
            .iter()
            .map(|(name, value)| Ok(Column::new(name.clone(), infer_type(name, value)?)))
            .collect::<Result<Vec<_>>>()?;

        overrides.apply(&mut columns)?;

        if let Some(column) = columns.iter().find(|c| !c.ty.is_fully_typed()) {
            return Err(IngestError::SchemaInference(format!(
                "column '{}' has no inferable type ({}); add an override for it",
                column.name, column.ty
            )));
        }

        let schema = Self { columns };
        debug!(columns = schema.columns.len(), schema = %schema, "Inferred schema");
        Ok(schema)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", column.name, column.ty)?;
        }
        Ok(())
    }
}

fn infer_type(path: &str, value: &Value) -> Result<ColumnType> {
    match value {
        Value::String(_) => Ok(ColumnType::Text),
        Value::Null => Ok(ColumnType::Unknown),
        Value::Array(items) => {
            let Some(first) = items.first() else {
                return Ok(ColumnType::list_of(ColumnType::Unknown));
            };
            let element_path = format!("{}[]", path);
            let element = infer_type(&element_path, first)?;
            for item in &items[1..] {
                if infer_type(&element_path, item)? != element {
                    return Err(IngestError::SchemaInference(format!(
                        "list '{}' mixes element types",
                        path
                    )));
                }
            }
            Ok(ColumnType::list_of(element))
        }
        Value::Object(fields) => fields
            .iter()
            .map(|(name, value)| {
                Ok(Column::new(
                    name.clone(),
                    infer_type(&format!("{}.{}", path, name), value)?,
                ))
            })
            .collect::<Result<Vec<_>>>()
            .map(ColumnType::Struct),
        Value::Bool(_) | Value::Number(_) => Err(IngestError::SchemaInference(format!(
            "field '{}' holds a {}, only text, lists and structs are supported",
            path,
            json_kind(value)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "struct",
    }
}

/// Forced column types keyed by dotted field path (`protein_names.recommended`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOverrides {
    rules: Vec<(String, ColumnType)>,
}

impl Default for SchemaOverrides {
    /// Every list field of [`Entry`], so empty samples infer cleanly
    fn default() -> Self {
        let text_list = || ColumnType::list_of(ColumnType::Text);

        Self::empty()
            .with("accessions", text_list())
            .with("names", text_list())
            .with("protein_names.recommended", text_list())
            .with("protein_names.alternative", text_list())
            .with("protein_names.submitted", text_list())
            .with("gene_names", text_list())
            .with("subcellular_locations", text_list())
            .with("hgnc_refs", text_list())
            .with(
                "ensembl_refs",
                ColumnType::list_of(ColumnType::text_struct(&["tid", "pid", "gid"])),
            )
    }
}

impl SchemaOverrides {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with(mut self, path: impl Into<String>, ty: ColumnType) -> Self {
        self.rules.push((path.into(), ty));
        self
    }

    /// Replace the type at each rule's path; a path naming no field is an error
    fn apply(&self, columns: &mut [Column]) -> Result<()> {
        for (path, ty) in &self.rules {
            let mut segments = path.split('.');
            let mut target = segments
                .next()
                .and_then(|name| columns.iter_mut().find(|c| c.name == name));

            for segment in segments {
                target = match target {
                    Some(Column {
                        ty: ColumnType::Struct(fields),
                        ..
                    }) => fields.iter_mut().find(|f| f.name == segment),
                    _ => None,
                };
            }

            match target {
                Some(column) => column.ty = ty.clone(),
                None => {
                    return Err(IngestError::SchemaInference(format!(
                        "override path '{}' does not name a field of the sample",
                        path
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::uniprot::{EnsemblRef, ProteinNames};
    use serde_json::json;

    fn sparse_entry() -> Entry {
        Entry {
            dataset: "TrEMBL".to_string(),
            created: "2010-01-01".to_string(),
            modified: "2010-01-02".to_string(),
            accessions: vec!["A0A000".to_string()],
            names: vec![],
            protein_names: ProteinNames::default(),
            gene_names: vec![],
            subcellular_locations: vec![],
            sequence: "MK".to_string(),
            hgnc_refs: vec![],
            ensembl_refs: vec![],
            proteinexistence: "predicted".to_string(),
        }
    }

    #[test]
    fn test_sparse_sample_with_default_overrides() {
        let schema = Schema::infer(&sparse_entry(), &SchemaOverrides::default()).unwrap();

        let names: Vec<&str> = schema.names().collect();
        assert_eq!(
            names,
            vec![
                "dataset",
                "created",
                "modified",
                "accessions",
                "names",
                "protein_names",
                "gene_names",
                "subcellular_locations",
                "sequence",
                "hgnc_refs",
                "ensembl_refs",
                "proteinexistence",
            ]
        );
        assert_eq!(
            schema.column("protein_names").unwrap().ty.to_string(),
            "struct<recommended: list<text>, alternative: list<text>, submitted: list<text>>"
        );
        assert_eq!(
            schema.column("ensembl_refs").unwrap().ty.to_string(),
            "list<struct<tid: text, pid: text, gid: text>>"
        );
        assert_eq!(schema.column("sequence").unwrap().ty, ColumnType::Text);
    }

    #[test]
    fn test_sparse_sample_without_overrides_fails() {
        let err = Schema::infer(&sparse_entry(), &SchemaOverrides::empty()).unwrap_err();
        assert!(matches!(err, IngestError::SchemaInference(_)));
        assert!(err.to_string().contains("'names'"));
    }

    #[test]
    fn test_full_sample_infers_without_overrides() {
        let mut entry = sparse_entry();
        entry.names = vec!["X_HUMAN".to_string()];
        entry.protein_names = ProteinNames {
            recommended: vec!["R".to_string()],
            alternative: vec!["A".to_string()],
            submitted: vec!["S".to_string()],
        };
        entry.gene_names = vec!["G".to_string()];
        entry.subcellular_locations = vec!["Nucleus".to_string()];
        entry.hgnc_refs = vec!["HGNC:1".to_string()];
        entry.ensembl_refs = vec![EnsemblRef {
            tid: "T".to_string(),
            pid: "P".to_string(),
            gid: "G".to_string(),
        }];

        let inferred = Schema::infer(&entry, &SchemaOverrides::empty()).unwrap();
        let pinned = Schema::infer(&sparse_entry(), &SchemaOverrides::default()).unwrap();
        assert_eq!(inferred, pinned);
    }

    #[test]
    fn test_unknown_override_path_rejected() {
        let overrides = SchemaOverrides::default().with("protein_names.short", ColumnType::Text);
        let err = Schema::infer(&sparse_entry(), &overrides).unwrap_err();
        assert!(err.to_string().contains("protein_names.short"));
    }

    #[test]
    fn test_infer_from_value_rejects_numbers_and_mixed_lists() {
        let overrides = SchemaOverrides::empty();
        assert!(Schema::infer_from_value(&json!({"n": 1}), &overrides).is_err());
        assert!(Schema::infer_from_value(&json!({"l": ["a", {"b": "c"}]}), &overrides).is_err());
        assert!(Schema::infer_from_value(&json!(["a"]), &overrides).is_err());
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(ColumnType::Text.sql_type(), "TEXT");
        assert_eq!(ColumnType::list_of(ColumnType::Text).sql_type(), "JSON");
        assert_eq!(ColumnType::text_struct(&["a"]).sql_type(), "JSON");
    }
}
