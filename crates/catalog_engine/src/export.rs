use std::path::{Path, PathBuf};

use catalog_core::{FieldValue, ProductRecord};
use harvest_logging::harvest_info;
use serde_json::{json, Map, Value};

use crate::persist::{AtomicFileWriter, PersistError};

/// The full ordered record set of one run, plus its metadata. Immutable once
/// the writer commits it.
#[derive(Debug)]
pub struct ExtractionResult {
    pub records: Vec<ProductRecord>,
    /// Rows rejected by normalization (missing required fields).
    pub skipped: usize,
    pub passes: u32,
    pub truncated: bool,
    pub target_hint: Option<u64>,
    pub extracted_utc: String,
}

/// Builds the snapshot document: a metadata header and the record array in
/// first-seen order, fields in schema order.
pub fn build_snapshot_document(result: &ExtractionResult) -> String {
    let products: Vec<Value> = result.records.iter().map(record_value).collect();
    let doc = json!({
        "extracted_utc": result.extracted_utc,
        "row_count": result.records.len(),
        "skipped_rows": result.skipped,
        "scroll_passes": result.passes,
        "truncated": result.truncated,
        "target_hint": result.target_hint,
        "products": products,
    });
    // Pretty output; the snapshot doubles as a human-inspectable artifact.
    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
}

fn record_value(record: &ProductRecord) -> Value {
    let mut object = Map::new();
    for (name, value) in &record.fields {
        object.insert(name.clone(), field_value(value));
    }
    object.insert(
        "cells".to_string(),
        Value::Array(record.cells.iter().map(|c| Value::String(c.clone())).collect()),
    );
    Value::Object(object)
}

fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(text) => Value::String(text.clone()),
        FieldValue::Integer(n) => json!(n),
        FieldValue::Number(n) => json!(n),
    }
}

/// Writes the snapshot to its fixed path. Atomic replace: a partial write
/// never clobbers a prior valid output file.
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, result: &ExtractionResult) -> Result<(), PersistError> {
        let document = build_snapshot_document(result);
        AtomicFileWriter::new(self.path.clone()).write(&document)?;
        harvest_info!(
            "Snapshot of {} records written to {:?}",
            result.records.len(),
            self.path
        );
        Ok(())
    }
}
