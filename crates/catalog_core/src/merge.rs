use std::collections::HashMap;

/// Stable identity of a table row, derived from its visible content.
///
/// Two captures of the same underlying row must produce the same key even if
/// transient rendering attributes (position, animation class) differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One row as captured from the page: ordered cell texts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }
}

/// Merges a sequence of overlapping observation windows into one deduplicated
/// set, preserving first-seen order.
///
/// A virtualized table only mounts a window of rows at a time, so the full row
/// set is reconstructed by merging captures taken at successive scroll
/// positions. The map deduplicates; the key list preserves order.
#[derive(Debug, Default)]
pub struct WindowMerge {
    order: Vec<RowKey>,
    rows: HashMap<RowKey, RawRow>,
}

impl WindowMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one capture into the accumulated set. Rows whose key was already
    /// seen are ignored. Returns how many rows were newly added.
    pub fn merge<I>(&mut self, capture: I) -> usize
    where
        I: IntoIterator<Item = (RowKey, RawRow)>,
    {
        let mut added = 0;
        for (key, row) in capture {
            if self.rows.contains_key(&key) {
                continue;
            }
            self.order.push(key.clone());
            self.rows.insert(key, row);
            added += 1;
        }
        added
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn ordered_keys(&self) -> &[RowKey] {
        &self.order
    }

    /// Consumes the accumulator, yielding rows in first-seen order.
    pub fn into_ordered_rows(mut self) -> Vec<(RowKey, RawRow)> {
        self.order
            .drain(..)
            .map(|key| {
                let row = self
                    .rows
                    .remove(&key)
                    .unwrap_or_default();
                (key, row)
            })
            .collect()
    }
}
