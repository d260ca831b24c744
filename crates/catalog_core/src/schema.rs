use crate::merge::RawRow;

/// Scalar type a column is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Number,
}

/// One configured column-to-field mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Output field name.
    pub field: String,
    /// Zero-based cell index in the captured row.
    pub column: usize,
    pub kind: FieldKind,
    /// A row missing a required field is skipped, not failed.
    pub required: bool,
}

/// The ordered field list configured per deployment. The schema is declared,
/// never discovered from the page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnSchema {
    columns: Vec<ColumnSpec>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
}

/// Normalized output unit: named fields in schema order, plus the raw cell
/// texts the record was mapped from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub fields: Vec<(String, FieldValue)>,
    pub cells: Vec<String>,
}

/// Maps a captured row onto the schema. Returns `None` when a required field
/// is absent or fails coercion; optional fields that fail are simply omitted.
pub fn normalize_row(raw: &RawRow, schema: &ColumnSchema) -> Option<ProductRecord> {
    let mut fields = Vec::with_capacity(schema.columns().len());
    for spec in schema.columns() {
        let cell = raw.cells.get(spec.column).map(|c| c.trim());
        let value = cell.filter(|c| !c.is_empty()).and_then(|c| coerce(spec.kind, c));
        match value {
            Some(value) => fields.push((spec.field.clone(), value)),
            None if spec.required => return None,
            None => {}
        }
    }
    Some(ProductRecord {
        fields,
        cells: raw.cells.iter().map(|c| c.trim().to_string()).collect(),
    })
}

fn coerce(kind: FieldKind, text: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => Some(FieldValue::Text(text.to_string())),
        FieldKind::Integer => clean_numeric(text).parse::<i64>().ok().map(FieldValue::Integer),
        FieldKind::Number => clean_numeric(text).parse::<f64>().ok().map(FieldValue::Number),
    }
}

/// Strips currency symbols and thousands separators so "$1,299.50" parses.
fn clean_numeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect()
}
