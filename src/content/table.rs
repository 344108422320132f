/// Table flattening: a row/column cell grid becomes header-keyed records.
use std::collections::{BTreeMap, HashMap};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::extract::Table;

/// One data row keyed by header text, in header column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRecord(pub Vec<(String, String)>);

impl TableRecord {
    #[must_use]
    pub fn get(&self, header: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TableRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Whether a table has content worth flattening (and a region that can
/// absorb paragraphs).
#[must_use]
pub fn has_content(table: &Table) -> bool {
    table.row_count > 0 && !table.cells.is_empty()
}

/// Flatten `table` into one record per data row.
///
/// Row 0 supplies headers. A column contributes to a row only when both its
/// header and the row's cell exist, so sparse grids give partial records.
#[must_use]
pub fn flatten(table: &Table) -> Vec<TableRecord> {
    if !has_content(table) {
        return Vec::new();
    }

    let mut grid: HashMap<(usize, usize), &str> = HashMap::new();
    for cell in &table.cells {
        grid.insert((cell.row_index, cell.column_index), cell.content.trim());
    }

    let headers = unique_headers(
        table
            .cells
            .iter()
            .filter(|c| c.row_index == 0)
            .map(|c| (c.column_index, c.content.trim()))
            .collect(),
    );

    (1..table.row_count)
        .map(|row| {
            TableRecord(
                headers
                    .iter()
                    .filter_map(|(col, header)| {
                        grid.get(&(row, *col))
                            .map(|value| (header.clone(), (*value).to_string()))
                    })
                    .collect(),
            )
        })
        .collect()
}

/// Order headers by column and disambiguate repeated header texts with a
/// ` (n)` suffix.
fn unique_headers(cells: BTreeMap<usize, &str>) -> Vec<(usize, String)> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    cells
        .into_iter()
        .map(|(col, text)| {
            let count = seen.entry(text).or_insert(0);
            *count += 1;
            let header = if *count == 1 {
                text.to_string()
            } else {
                format!("{text} ({count})")
            };
            (col, header)
        })
        .collect()
}

/// Serialize flattened records as the chunk text sent to the model.
#[must_use]
pub fn records_to_text(records: &[TableRecord]) -> String {
    // Serializing string pairs cannot fail.
    serde_json::to_string(records).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Cell;

    fn cell(row: usize, col: usize, content: &str) -> Cell {
        Cell {
            row_index: row,
            column_index: col,
            content: content.to_string(),
        }
    }

    fn table(row_count: usize, column_count: usize, cells: Vec<Cell>) -> Table {
        Table {
            row_count,
            column_count,
            cells,
            spans: vec![],
        }
    }

    #[test]
    fn test_flatten_simple_table() {
        let t = table(
            2,
            2,
            vec![
                cell(0, 0, "Name"),
                cell(0, 1, "Amount"),
                cell(1, 0, "Alice"),
                cell(1, 1, "100"),
            ],
        );
        let records = flatten(&t);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0],
            TableRecord(vec![
                ("Name".into(), "Alice".into()),
                ("Amount".into(), "100".into())
            ])
        );
        assert_eq!(
            records_to_text(&records),
            r#"[{"Name":"Alice","Amount":"100"}]"#
        );
    }

    #[test]
    fn test_zero_rows_yields_nothing() {
        let t = table(0, 2, vec![cell(0, 0, "Name")]);
        assert!(flatten(&t).is_empty());
        assert!(!has_content(&t));
        assert!(flatten(&table(3, 3, vec![])).is_empty());
    }

    #[test]
    fn test_cells_are_trimmed_and_ordered_by_column() {
        // cells arrive out of order
        let t = table(
            2,
            2,
            vec![
                cell(1, 1, " 7 "),
                cell(0, 1, " Count "),
                cell(1, 0, "  Ports"),
                cell(0, 0, "Item\n"),
            ],
        );
        let records = flatten(&t);
        assert_eq!(
            records[0].0,
            vec![
                ("Item".to_string(), "Ports".to_string()),
                ("Count".to_string(), "7".to_string())
            ]
        );
    }

    #[test]
    fn test_sparse_grid_gives_partial_records() {
        let t = table(
            3,
            3,
            vec![
                cell(0, 0, "A"),
                cell(0, 1, "B"),
                cell(1, 0, "a1"),
                cell(1, 2, "orphan"), // no header for column 2
                cell(2, 1, "b2"),
            ],
        );
        let records = flatten(&t);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("A"), Some("a1"));
        assert_eq!(records[0].get("B"), None);
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[1].get("B"), Some("b2"));
        assert_eq!(records[1].get("A"), None);
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let t = table(
            2,
            3,
            vec![
                cell(0, 0, "Amount"),
                cell(0, 1, "Amount"),
                cell(0, 2, "Amount"),
                cell(1, 0, "1"),
                cell(1, 1, "2"),
                cell(1, 2, "3"),
            ],
        );
        let records = flatten(&t);
        assert_eq!(records[0].get("Amount"), Some("1"));
        assert_eq!(records[0].get("Amount (2)"), Some("2"));
        assert_eq!(records[0].get("Amount (3)"), Some("3"));
    }

    #[test]
    fn test_header_only_table() {
        let t = table(1, 2, vec![cell(0, 0, "Name"), cell(0, 1, "Amount")]);
        assert!(flatten(&t).is_empty());
    }
}
