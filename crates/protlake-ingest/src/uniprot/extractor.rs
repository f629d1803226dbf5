//! Streaming UniProt XML entry extractor
//!
//! Drives a forward-only `quick_xml` namespace-aware reader and yields one
//! [`Entry`] per `<entry>` element, in document order. Only the events of the
//! entry currently being read are held in memory: each entry is assembled
//! into an owned [`Element`] tree, queried, and dropped before the entry is
//! handed to the caller.
//!
//! Schema reference: <https://ftp.uniprot.org/pub/databases/uniprot/current_release/knowledgebase/complete/uniprot.xsd>

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use std::io::BufRead;
use tracing::{debug, trace, warn};

use super::models::{EnsemblRef, Entry, ProteinNames};
use super::tree::{Element, TreeBuilder};
use crate::config::InvalidRecordPolicy;
use crate::error::{IngestError, Result};

/// Namespace of every element in a UniProt XML dump
pub const UNIPROT_NS: &str = "http://uniprot.org/uniprot";

/// Counters reported by an extractor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Entries handed to the caller
    pub yielded: u64,
    /// Invalid entries dropped under [`InvalidRecordPolicy::Skip`]
    pub skipped: u64,
}

/// Lazy, single-pass sequence of entries read from a UniProt XML stream
///
/// Not restartable: to read the entries again, reopen the source. After the
/// first error the iterator is exhausted.
pub struct EntryExtractor<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    policy: InvalidRecordPolicy,
    stats: ExtractStats,
    depth: usize,
    seen_root: bool,
    finished: bool,
}

impl<R: BufRead> EntryExtractor<R> {
    pub fn new(source: R) -> Self {
        // Untrimmed, so text split by a comment keeps its inner whitespace
        let reader = NsReader::from_reader(source);

        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            policy: InvalidRecordPolicy::Abort,
            stats: ExtractStats::default(),
            depth: 0,
            seen_root: false,
            finished: false,
        }
    }

    /// Choose how entries missing required fields are handled
    pub fn with_policy(mut self, policy: InvalidRecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    /// Read events until the next entry closes or the document ends
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        let mut tree: Option<TreeBuilder> = None;
        // >0 while inside a foreign-namespace subtree of the current entry
        let mut foreign_depth = 0usize;

        loop {
            self.buf.clear();
            let position = self.reader.buffer_position() as u64;
            let (ns, event) = self
                .reader
                .read_resolved_event_into(&mut self.buf)
                .map_err(|e| IngestError::malformed(position, e.to_string()))?;
            let in_uniprot = matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == UNIPROT_NS.as_bytes());

            match event {
                Event::Start(start) => {
                    self.depth += 1;
                    self.seen_root = true;

                    if let Some(builder) = tree.as_mut() {
                        if foreign_depth > 0 || !in_uniprot {
                            foreign_depth += 1;
                        } else {
                            builder.open(local_name(&start), attributes(&start, position)?);
                        }
                    } else if in_uniprot && start.local_name().as_ref() == b"entry" {
                        let mut builder = TreeBuilder::new();
                        builder.open("entry", attributes(&start, position)?);
                        tree = Some(builder);
                    }
                }
                Event::Empty(start) => {
                    self.seen_root = true;

                    if let Some(builder) = tree.as_mut() {
                        if foreign_depth == 0 && in_uniprot {
                            builder.open(local_name(&start), attributes(&start, position)?);
                            builder.close();
                        }
                    } else if in_uniprot && start.local_name().as_ref() == b"entry" {
                        let entry = Element::new("entry", attributes(&start, position)?);
                        return extract_entry(&entry).map(Some);
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                        IngestError::malformed(position, "closing tag without an open element")
                    })?;

                    if let Some(builder) = tree.as_mut() {
                        if foreign_depth > 0 {
                            foreign_depth -= 1;
                        } else if let Some(entry) = builder.close() {
                            // `entry` is dropped when this arm returns
                            return extract_entry(&entry).map(Some);
                        }
                    }
                }
                Event::Text(text) => {
                    if let Some(builder) = tree.as_mut() {
                        if foreign_depth == 0 {
                            let text = text
                                .unescape()
                                .map_err(|e| IngestError::malformed(position, e.to_string()))?;
                            builder.text(&text);
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(builder) = tree.as_mut() {
                        if foreign_depth == 0 {
                            let text = std::str::from_utf8(&data)
                                .map_err(|e| IngestError::malformed(position, e.to_string()))?;
                            builder.text(text);
                        }
                    }
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(IngestError::malformed(
                            position,
                            format!("document ended with {} element(s) still open", self.depth),
                        ));
                    }
                    if !self.seen_root {
                        return Err(IngestError::malformed(position, "document has no root element"));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for EntryExtractor<R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.next_entry() {
                Ok(Some(entry)) => {
                    self.stats.yielded += 1;
                    trace!(accession = ?entry.primary_accession(), "Extracted entry");
                    return Some(Ok(entry));
                }
                Ok(None) => {
                    self.finished = true;
                    debug!(
                        yielded = self.stats.yielded,
                        skipped = self.stats.skipped,
                        "Reached end of document"
                    );
                    return None;
                }
                Err(e) if e.is_record_level() && self.policy == InvalidRecordPolicy::Skip => {
                    self.stats.skipped += 1;
                    warn!(error = %e, "Skipping invalid entry");
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attributes(start: &BytesStart<'_>, position: u64) -> Result<Vec<(String, String)>> {
    start
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| IngestError::malformed(position, e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| IngestError::malformed(position, e.to_string()))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn texts(elements: Vec<&Element>) -> Vec<String> {
    elements.into_iter().map(|e| e.text().to_string()).collect()
}

/// Build an [`Entry`] from a complete `<entry>` tree
pub fn extract_entry(entry: &Element) -> Result<Entry> {
    let label = entry
        .child("accession")
        .map(|a| a.text().to_string())
        .unwrap_or_else(|| "<no accession>".to_string());

    let required_attr = |key: &'static str| {
        entry
            .attr(key)
            .map(str::to_string)
            .ok_or_else(|| IngestError::missing_field(label.as_str(), key))
    };

    let dataset = required_attr("dataset")?;
    let created = required_attr("created")?;
    let modified = required_attr("modified")?;

    let accessions = texts(entry.descend(&["accession"]));
    let names = texts(entry.descend(&["name"]));
    let protein_names = extract_protein_names(entry, &label)?;
    let gene_names = texts(entry.descend(&["gene", "name"]));
    let subcellular_locations =
        texts(entry.descend(&["comment", "subcellularLocation", "location"]));

    let hgnc_refs = entry
        .children_where("dbReference", "type", "HGNC")
        .map(|r| {
            r.attr("id")
                .map(str::to_string)
                .ok_or_else(|| IngestError::missing_field(label.as_str(), "HGNC reference id"))
        })
        .collect::<Result<Vec<_>>>()?;

    let ensembl_refs = entry
        .children_where("dbReference", "type", "Ensembl")
        .map(|r| extract_ensembl_ref(r, &label))
        .collect::<Result<Vec<_>>>()?;

    let sequence = entry
        .child("sequence")
        .map(|s| s.text().to_string())
        .ok_or_else(|| IngestError::missing_field(label.as_str(), "sequence"))?;

    let proteinexistence = entry
        .child("proteinExistence")
        .and_then(|p| p.attr("type"))
        .map(str::to_string)
        .ok_or_else(|| IngestError::missing_field(label.as_str(), "proteinExistence type"))?;

    Ok(Entry {
        dataset,
        created,
        modified,
        accessions,
        names,
        protein_names,
        gene_names,
        subcellular_locations,
        sequence,
        hgnc_refs,
        ensembl_refs,
        proteinexistence,
    })
}

/// `./protein/*[fullName]`, keyed by the name element
fn extract_protein_names(entry: &Element, label: &str) -> Result<ProteinNames> {
    let mut names = ProteinNames::default();

    if let Some(protein) = entry.child("protein") {
        for name_element in protein.children() {
            if let Some(full_name) = name_element.child("fullName") {
                if !names.push(name_element.name(), full_name.text().to_string()) {
                    trace!(element = name_element.name(), "Ignoring unrecognised protein name element");
                }
            }
        }
    }

    if names.recommended.len() > 1 {
        return Err(IngestError::invalid_record(
            label,
            format!("{} recommendedName elements, at most one allowed", names.recommended.len()),
        ));
    }

    Ok(names)
}

/// A reference missing any identifier is unusable for joins and fails the record
fn extract_ensembl_ref(reference: &Element, label: &str) -> Result<EnsemblRef> {
    let property = |kind: &'static str| {
        reference
            .child_where("property", "type", kind)
            .and_then(|p| p.attr("value"))
            .map(str::to_string)
            .ok_or_else(|| IngestError::missing_field(label, kind))
    };

    let tid = reference
        .attr("id")
        .map(str::to_string)
        .ok_or_else(|| IngestError::missing_field(label, "Ensembl reference id"))?;

    Ok(EnsemblRef {
        tid,
        pid: property("protein sequence ID")?,
        gid: property("gene ID")?,
    })
}
