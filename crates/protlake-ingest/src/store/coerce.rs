//! Schema coercion
//!
//! Every entry is checked against the run's fixed [`Schema`] before any row of
//! its batch reaches the store. A missing field, an unexpected field or a
//! value of the wrong shape fails the whole batch.

use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::schema::{json_kind, ColumnType, Schema};
use crate::uniprot::Entry;

/// One entry encoded as column values, in schema order
///
/// Text columns carry their value, list and struct columns carry JSON.
pub type Row = Vec<String>;

/// Coerce one entry; `record` is its zero-based position in the run
pub fn coerce_entry(schema: &Schema, entry: &Entry, record: u64) -> Result<Row> {
    let value = serde_json::to_value(entry)
        .map_err(|e| IngestError::coercion(record, "$", "an entry", e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(IngestError::coercion(record, "$", "struct", "another value"));
    };

    let mut row = Vec::with_capacity(schema.columns().len());
    for column in schema.columns() {
        let value = fields
            .remove(&column.name)
            .ok_or_else(|| IngestError::coercion(record, &column.name, column.ty.to_string(), "nothing"))?;
        check(&value, &column.ty, &column.name, record)?;

        row.push(match value {
            Value::String(text) => text,
            other => other.to_string(),
        });
    }

    if let Some(extra) = fields.keys().next() {
        return Err(IngestError::coercion(record, extra, "no such column", "a value"));
    }

    Ok(row)
}

/// Coerce a batch whose first entry has run position `first_record`
///
/// Fails on the first bad entry; nothing is returned for a partially valid batch.
pub fn coerce_batch(schema: &Schema, entries: &[Entry], first_record: u64) -> Result<Vec<Row>> {
    entries
        .iter()
        .zip(first_record..)
        .map(|(entry, record)| coerce_entry(schema, entry, record))
        .collect()
}

fn check(value: &Value, ty: &ColumnType, path: &str, record: u64) -> Result<()> {
    let mismatch = || IngestError::coercion(record, path, ty.to_string(), json_kind(value));

    match (ty, value) {
        (ColumnType::Text, Value::String(_)) => Ok(()),
        (ColumnType::List(element), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check(item, element, &format!("{}[{}]", path, i), record)?;
            }
            Ok(())
        }
        (ColumnType::Struct(fields), Value::Object(object)) => {
            for field in fields {
                let field_path = format!("{}.{}", path, field.name);
                let item = object.get(&field.name).ok_or_else(|| {
                    IngestError::coercion(record, &field_path, field.ty.to_string(), "nothing")
                })?;
                check(item, &field.ty, &field_path, record)?;
            }
            if let Some(extra) = object.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
                return Err(IngestError::coercion(
                    record,
                    format!("{}.{}", path, extra),
                    "no such field",
                    "a value",
                ));
            }
            Ok(())
        }
        _ => Err(mismatch()),
    }
}
