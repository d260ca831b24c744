use catalog_core::{RawRow, RowKey};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

/// How a row's stable identity is derived from its cells.
///
/// `KeyColumn` trusts one visible column (typically an ID) to be stable
/// across re-renders. `ContentHash` hashes every cell, for deployments whose
/// virtualization re-keys rows on render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    KeyColumn(usize),
    ContentHash,
}

/// Parses the mounted rows out of a table's HTML fragment. A virtualized
/// table only mounts its visible window, so the fragment is one observation
/// window.
pub fn parse_table_rows(html: &str) -> Vec<RawRow> {
    let fragment = Html::parse_fragment(html);
    let row_sel = match Selector::parse("tbody tr") {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    let cell_sel = match Selector::parse("td") {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };

    fragment
        .select(&row_sel)
        .map(|tr| {
            let cells = tr
                .select(&cell_sel)
                .map(|td| td.text().collect::<String>().trim().to_string())
                .collect();
            RawRow::new(cells)
        })
        .filter(|row: &RawRow| !row.cells.is_empty())
        .collect()
}

/// Derives the row's identity per the configured strategy. Returns `None`
/// for rows that cannot carry one (missing or blank key cell), which are
/// dropped from the capture rather than merged under a bogus key.
pub fn derive_identity(strategy: IdentityStrategy, row: &RawRow) -> Option<RowKey> {
    match strategy {
        IdentityStrategy::KeyColumn(column) => row
            .cells
            .get(column)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(RowKey::new),
        IdentityStrategy::ContentHash => {
            if row.cells.iter().all(|c| c.trim().is_empty()) {
                return None;
            }
            Some(RowKey::new(content_hash(&row.cells)))
        }
    }
}

/// Short stable hex digest over all cells. The unit separator keeps
/// ["ab", "c"] and ["a", "bc"] distinct.
fn content_hash(cells: &[String]) -> String {
    let mut hasher = Sha256::new();
    for cell in cells {
        hasher.update(cell.trim().as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
