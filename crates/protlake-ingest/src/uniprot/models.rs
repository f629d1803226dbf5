//! UniProt entry model

use serde::{Deserialize, Serialize};

/// One `<entry>` of a UniProt XML dump
///
/// Field order is the column order of the base table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// "Swiss-Prot" or "TrEMBL"
    pub dataset: String,
    /// `YYYY-MM-DD`, converted to a date after loading
    pub created: String,
    pub modified: String,
    /// Never empty in valid data; element 0 is the primary accession
    pub accessions: Vec<String>,
    /// Entry names such as "INS_HUMAN"
    pub names: Vec<String>,
    pub protein_names: ProteinNames,
    pub gene_names: Vec<String>,
    pub subcellular_locations: Vec<String>,
    pub sequence: String,
    pub hgnc_refs: Vec<String>,
    pub ensembl_refs: Vec<EnsemblRef>,
    /// e.g. "evidence at protein level"
    pub proteinexistence: String,
}

/// Full names grouped by the kind of name element they came from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProteinNames {
    /// At most one element
    pub recommended: Vec<String>,
    pub alternative: Vec<String>,
    pub submitted: Vec<String>,
}

/// Ensembl cross-reference: transcript, protein and gene identifiers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnsemblRef {
    pub tid: String,
    pub pid: String,
    pub gid: String,
}

impl Entry {
    /// The primary accession, if the entry has any
    pub fn primary_accession(&self) -> Option<&str> {
        self.accessions.first().map(String::as_str)
    }
}

impl ProteinNames {
    /// Route a full name to the list matching its name element
    ///
    /// Returns false for element names that carry no protein name.
    pub fn push(&mut self, element: &str, full_name: String) -> bool {
        let list = match element {
            "recommendedName" => &mut self.recommended,
            "alternativeName" => &mut self.alternative,
            "submittedName" => &mut self.submitted,
            _ => return false,
        };
        list.push(full_name);
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_protein_names_push() {
        let mut names = ProteinNames::default();
        assert!(names.push("recommendedName", "Insulin".to_string()));
        assert!(names.push("alternativeName", "Proinsulin".to_string()));
        assert!(!names.push("domain", "B chain".to_string()));

        assert_eq!(names.recommended, vec!["Insulin"]);
        assert_eq!(names.alternative, vec!["Proinsulin"]);
        assert!(names.submitted.is_empty());
    }

    #[test]
    fn test_serialized_field_order() {
        let entry = Entry {
            dataset: "Swiss-Prot".to_string(),
            created: "1986-07-21".to_string(),
            modified: "2024-01-24".to_string(),
            accessions: vec!["P01308".to_string()],
            names: vec!["INS_HUMAN".to_string()],
            protein_names: ProteinNames::default(),
            gene_names: vec![],
            subcellular_locations: vec![],
            sequence: "MALWMR".to_string(),
            hgnc_refs: vec![],
            ensembl_refs: vec![],
            proteinexistence: "evidence at protein level".to_string(),
        };

        let value = serde_json::to_value(&entry).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.first(), Some(&"dataset"));
        assert_eq!(keys.last(), Some(&"proteinexistence"));
        assert_eq!(keys.len(), 12);
        assert_eq!(entry.primary_accession(), Some("P01308"));
    }
}
