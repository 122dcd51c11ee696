//! Bounds the history lookups to the cells that plausibly held data at the target time.
//!
//! This uses the live sheet as a proxy: a row created after the target did not exist yet, and a
//! cell that is empty now is assumed to have been empty then. A cell cleared before the target but
//! filled now is wrongly included (its history resolves to the cleared revision or nothing), and a
//! cell filled at the target but cleared since is missed.

use crate::model::{parse_timestamp, Sheet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A (row, column) address on the source sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRef {
    pub row_id: i64,
    pub column_id: i64,
}

/// The cells of `sheet` whose history should be consulted for `target`, in sheet order.
pub fn candidates(sheet: &Sheet, target: DateTime<Utc>) -> Vec<CellRef> {
    let mut cells = Vec::new();
    for row in &sheet.rows {
        let created = row.created_at.as_deref().and_then(parse_timestamp);
        if created.is_some_and(|created| created > target) {
            debug!("Skipping row {} created after {target}", row.id);
            continue;
        }
        for cell in &row.cells {
            let Some(column_id) = cell.column_id else {
                continue;
            };
            if cell.value.as_ref().is_some_and(|v| !v.is_null()) {
                cells.push(CellRef {
                    row_id: row.id,
                    column_id,
                });
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cell, Row};
    use serde_json::{json, Value};

    fn cell(column_id: i64, value: Option<Value>) -> Cell {
        Cell {
            column_id: Some(column_id),
            value,
            ..Default::default()
        }
    }

    fn row(id: i64, created_at: Option<&str>, cells: Vec<Cell>) -> Row {
        Row {
            id,
            row_number: None,
            created_at: created_at.map(str::to_string),
            modified_at: None,
            cells,
        }
    }

    #[test]
    fn test_rows_created_after_target_are_excluded() {
        let sheet = Sheet {
            id: 1,
            rows: vec![
                row(10, Some("2025-01-01T00:00:00Z"), vec![cell(1, Some(json!("old")))]),
                row(11, Some("2025-06-01T00:00:00Z"), vec![cell(1, Some(json!("new")))]),
            ],
            ..Default::default()
        };
        let got = candidates(&sheet, parse_timestamp("2025-03-01T00:00:00Z").unwrap());
        assert_eq!(got, vec![CellRef { row_id: 10, column_id: 1 }]);
    }

    #[test]
    fn test_empty_cells_are_excluded() {
        let sheet = Sheet {
            id: 1,
            rows: vec![row(
                10,
                None,
                vec![
                    cell(1, Some(json!(0))),
                    cell(2, None),
                    cell(3, Some(Value::Null)),
                    Cell {
                        column_id: None,
                        value: Some(json!("orphan")),
                        ..Default::default()
                    },
                ],
            )],
            ..Default::default()
        };
        let got = candidates(&sheet, parse_timestamp("2025-03-01").unwrap());
        assert_eq!(got, vec![CellRef { row_id: 10, column_id: 1 }]);
    }

    #[test]
    fn test_row_without_creation_time_is_included() {
        let sheet = Sheet {
            id: 1,
            rows: vec![row(10, Some("garbage"), vec![cell(1, Some(json!("x")))])],
            ..Default::default()
        };
        let got = candidates(&sheet, parse_timestamp("2020-01-01").unwrap());
        assert_eq!(got.len(), 1);
    }
}
