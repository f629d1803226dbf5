//! Entry subset filter
//!
//! Copies a UniProt XML document while dropping every entry that does not
//! carry a given HGNC cross-reference. Used to cut small fixtures out of a
//! full dump; the output is a valid extractor input.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;
use std::io::{BufRead, Write};
use tracing::{debug, info};

use super::extractor::UNIPROT_NS;
use crate::error::{IngestError, Result};

/// HGNC identifier kept when none is given (TNF)
pub const DEFAULT_HGNC_ID: &str = "HGNC:11892";

/// Entries kept and dropped by a filter run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: u64,
    pub dropped: u64,
}

/// Events of the entry being filtered, held until its end tag decides its fate
struct PendingEntry {
    events: Vec<Event<'static>>,
    keep: bool,
}

fn write_event<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| IngestError::Io(std::io::Error::other(e.to_string())))
}

fn attr_value(start: &BytesStart<'_>, key: &str, position: u64) -> Result<Option<String>> {
    let attr = start
        .try_get_attribute(key)
        .map_err(|e| IngestError::malformed(position, e.to_string()))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|e| IngestError::malformed(position, e.to_string()))
    })
    .transpose()
}

fn is_hgnc_ref(start: &BytesStart<'_>, hgnc_id: &str, position: u64) -> Result<bool> {
    if start.local_name().as_ref() != b"dbReference" {
        return Ok(false);
    }
    Ok(attr_value(start, "type", position)?.as_deref() == Some("HGNC")
        && attr_value(start, "id", position)?.as_deref() == Some(hgnc_id))
}

/// Stream `source` to `sink`, keeping only entries referencing `hgnc_id`
///
/// The root element and its non-entry children are copied unchanged. At most
/// one entry's events are buffered at a time.
pub fn filter_entries<R: BufRead, W: Write>(
    source: R,
    sink: W,
    hgnc_id: &str,
) -> Result<FilterStats> {
    let mut reader = NsReader::from_reader(source);
    let mut writer = Writer::new(sink);
    let mut buf = Vec::with_capacity(8 * 1024);
    let mut stats = FilterStats::default();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut pending: Option<PendingEntry> = None;

    info!(hgnc_id = %hgnc_id, "Filtering entries");

    loop {
        buf.clear();
        let position = reader.buffer_position() as u64;
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| IngestError::malformed(position, e.to_string()))?;
        let in_uniprot = matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == UNIPROT_NS.as_bytes());

        match &event {
            Event::Start(_) => {
                depth += 1;
                seen_root = true;
            }
            Event::Empty(_) => seen_root = true,
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    IngestError::malformed(position, "closing tag without an open element")
                })?;
            }
            Event::Eof => {
                if depth > 0 {
                    return Err(IngestError::malformed(
                        position,
                        format!("document ended with {} element(s) still open", depth),
                    ));
                }
                if !seen_root {
                    return Err(IngestError::malformed(position, "document has no root element"));
                }
                break;
            }
            _ => {}
        }

        if let Some(entry) = pending.as_mut() {
            // Direct children of the entry sit at depth 3 once opened
            let reference = match &event {
                Event::Start(start) if depth == 3 => Some(start),
                Event::Empty(start) if depth == 2 => Some(start),
                _ => None,
            };
            if let Some(start) = reference.filter(|_| in_uniprot) {
                if is_hgnc_ref(start, hgnc_id, position)? {
                    entry.keep = true;
                }
            }

            let closes_entry = depth == 1 && matches!(event, Event::End(_));
            entry.events.push(event.into_owned());

            if closes_entry {
                if let Some(entry) = pending.take() {
                    if entry.keep {
                        for event in entry.events {
                            write_event(&mut writer, event)?;
                        }
                        stats.kept += 1;
                    } else {
                        stats.dropped += 1;
                    }
                }
            }
            continue;
        }

        let is_entry = |start: &BytesStart<'_>| in_uniprot && start.local_name().as_ref() == b"entry";
        let opens_entry = matches!(&event, Event::Start(start) if depth == 2 && is_entry(start));
        let empty_entry = matches!(&event, Event::Empty(start) if depth == 1 && is_entry(start));

        if opens_entry {
            pending = Some(PendingEntry {
                events: vec![event.into_owned()],
                keep: false,
            });
        } else if empty_entry {
            // An empty entry has no cross-references
            stats.dropped += 1;
        } else {
            write_event(&mut writer, event)?;
        }
    }

    writer.into_inner().flush()?;
    debug!(kept = stats.kept, dropped = stats.dropped, "Filter finished");
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::uniprot::EntryExtractor;

    fn entry(accession: &str, hgnc: &str) -> String {
        format!(
            r#"<entry dataset="Swiss-Prot" created="2001-01-01" modified="2020-02-02">
<accession>{accession}</accession>
<dbReference type="HGNC" id="{hgnc}"><property type="gene designation" value="X"/></dbReference>
<proteinExistence type="predicted"/>
<sequence>MK</sequence>
</entry>"#
        )
    }

    fn document(entries: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<uniprot xmlns=\"http://uniprot.org/uniprot\">\n{}\n<copyright>c</copyright>\n</uniprot>",
            entries.join("\n")
        )
    }

    fn run(xml: &str, hgnc: &str) -> (String, FilterStats) {
        let mut out = Vec::new();
        let stats = filter_entries(xml.as_bytes(), &mut out, hgnc).unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[test]
    fn test_keeps_matching_entries_only() {
        let xml = document(&[
            entry("P1", "HGNC:11892"),
            entry("P2", "HGNC:6081"),
            entry("P3", "HGNC:11892"),
        ]);
        let (out, stats) = run(&xml, DEFAULT_HGNC_ID);

        assert_eq!(stats, FilterStats { kept: 2, dropped: 1 });
        assert!(out.contains("<accession>P1</accession>"));
        assert!(!out.contains("<accession>P2</accession>"));
        assert!(out.contains("<accession>P3</accession>"));
        assert!(out.contains("<copyright>c</copyright>"));
    }

    #[test]
    fn test_output_is_extractor_input() {
        let xml = document(&[entry("P1", "HGNC:6081"), entry("P2", "HGNC:11892")]);
        let (out, _) = run(&xml, DEFAULT_HGNC_ID);

        let entries: Vec<_> = EntryExtractor::new(out.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].accessions, vec!["P2"]);
        assert_eq!(entries[0].hgnc_refs, vec!["HGNC:11892"]);
    }

    #[test]
    fn test_nested_references_do_not_match() {
        let nested = r#"<entry dataset="Swiss-Prot" created="2001-01-01" modified="2020-02-02">
<accession>P9</accession>
<evidence><source><dbReference type="HGNC" id="HGNC:11892"/></source></evidence>
<proteinExistence type="predicted"/>
<sequence>MK</sequence>
</entry>"#;
        let (_, stats) = run(&document(&[nested.to_string()]), DEFAULT_HGNC_ID);
        assert_eq!(stats, FilterStats { kept: 0, dropped: 1 });
    }

    #[test]
    fn test_foreign_namespace_references_do_not_match() {
        let foreign = entry("P4", "HGNC:6081").replace(
            "<proteinExistence",
            r#"<x:dbReference xmlns:x="urn:other" type="HGNC" id="HGNC:11892"/>
<proteinExistence"#,
        );
        let (out, stats) = run(&document(&[foreign]), DEFAULT_HGNC_ID);
        assert_eq!(stats, FilterStats { kept: 0, dropped: 1 });
        assert!(!out.contains("P4"));
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let xml = document(&[entry("P1", "HGNC:11892")]);
        let truncated = &xml[..xml.find("<proteinExistence").unwrap()];
        let mut out = Vec::new();
        let err = filter_entries(truncated.as_bytes(), &mut out, DEFAULT_HGNC_ID).unwrap_err();
        assert!(matches!(err, IngestError::MalformedStream { .. }));
    }
}
