//! Correlates rows and columns of a source sheet with those of its freshly made copy, and spots the
//! columns the service fills in by itself.
//!
//! A copy gets new ids for everything. Columns are matched by title, which survives the copy, and
//! rows by row number, which survives only until the copy is edited.

use crate::model::{Column, Row};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Titles the service gives its auto-populated columns.
const SYSTEM_COLUMN_TITLES: [&str; 4] = ["Modified By", "Modified Date", "Created By", "Created Date"];

/// Maps each source column id to a target column id. Columns are first matched by exact title;
/// those left over are matched to the target column at the same position. Title collisions and
/// renames make the positional pass unreliable, so each use of it is logged.
pub fn map_columns(source: &[Column], target: &[Column]) -> HashMap<i64, i64> {
    let mut map = HashMap::with_capacity(source.len());
    for column in source {
        if let Some(found) = target.iter().find(|t| t.title == column.title) {
            map.insert(column.id, found.id);
        }
    }

    for (index, column) in source.iter().enumerate() {
        if map.contains_key(&column.id) {
            continue;
        }
        match target.get(index) {
            Some(found) => {
                warn!(
                    "Column '{}' has no title match, mapping it by position to '{}'",
                    column.title, found.title
                );
                map.insert(column.id, found.id);
            }
            None => warn!("Could not map column '{}' ({})", column.title, column.id),
        }
    }

    info!("Mapped {} of {} columns", map.len(), source.len());
    map
}

/// Maps each source row id to the id of the target row with the same row number. Rows without a
/// row number are taken to be numbered by their position.
pub fn map_rows(source: &[Row], target: &[Row]) -> HashMap<i64, i64> {
    let number = |index: usize, row: &Row| row.row_number.map_or(index + 1, |n| n as usize);

    let by_number: HashMap<usize, i64> = target
        .iter()
        .enumerate()
        .map(|(index, row)| (number(index, row), row.id))
        .collect();

    let map: HashMap<i64, i64> = source
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let target_id = by_number.get(&number(index, row)).copied()?;
            Some((row.id, target_id))
        })
        .collect();
    debug!("Mapped {} of {} rows", map.len(), source.len());
    map
}

/// Whether the service maintains this column's values itself.
pub fn is_system_column(column: &Column) -> bool {
    column.system_column_type.is_some()
        || column.column_type.as_deref() == Some("SYSTEM")
        || SYSTEM_COLUMN_TITLES.contains(&column.title.as_str())
}

/// The ids of the system columns in `columns`.
pub fn system_column_ids(columns: &[Column]) -> HashSet<i64> {
    columns
        .iter()
        .filter(|c| is_system_column(c))
        .inspect(|c| debug!("'{}' ({}) is a system column", c.title, c.id))
        .map(|c| c.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::column;

    #[test]
    fn test_map_columns_by_title() {
        let source = vec![column(1, "Name"), column(2, "Status")];
        let target = vec![column(20, "Status"), column(10, "Name")];
        let map = map_columns(&source, &target);
        assert_eq!(map.get(&1), Some(&10));
        assert_eq!(map.get(&2), Some(&20));
    }

    #[test]
    fn test_renamed_column_falls_back_to_position() {
        let source = vec![column(1, "Name"), column(2, "Owner"), column(3, "Due")];
        let target = vec![column(10, "Name"), column(20, "Assignee"), column(30, "Due")];
        let map = map_columns(&source, &target);
        assert_eq!(map.get(&1), Some(&10));
        assert_eq!(map.get(&3), Some(&30));
        assert_eq!(map.get(&2), Some(&20));
    }

    #[test]
    fn test_unmappable_column_is_left_out() {
        let source = vec![column(1, "Name"), column(2, "Extra")];
        let target = vec![column(10, "Name")];
        let map = map_columns(&source, &target);
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key(&2));
    }

    #[test]
    fn test_map_rows_by_row_number() {
        let source = vec![
            Row {
                id: 100,
                row_number: Some(1),
                ..Default::default()
            },
            Row {
                id: 200,
                row_number: Some(2),
                ..Default::default()
            },
            Row {
                id: 300,
                row_number: Some(3),
                ..Default::default()
            },
        ];
        let target = vec![
            Row {
                id: 9002,
                row_number: Some(2),
                ..Default::default()
            },
            Row {
                id: 9001,
                row_number: Some(1),
                ..Default::default()
            },
        ];
        let map = map_rows(&source, &target);
        assert_eq!(map.get(&100), Some(&9001));
        assert_eq!(map.get(&200), Some(&9002));
        assert_eq!(map.get(&300), None);
    }

    #[test]
    fn test_map_rows_with_huge_row_number() {
        let row = |id, n| Row {
            id,
            row_number: Some(n),
            ..Default::default()
        };
        let source = vec![row(100, 1), row(200, u32::MAX)];
        let target = vec![row(9001, 1), row(9002, u32::MAX)];
        let map = map_rows(&source, &target);
        assert_eq!(map.get(&100), Some(&9001));
        assert_eq!(map.get(&200), Some(&9002));
    }

    #[test]
    fn test_created_date_title_is_system() {
        let columns = vec![column(1, "Name"), column(2, "Created Date")];
        let ids = system_column_ids(&columns);
        assert_eq!(ids, HashSet::from([2]));
    }

    #[test]
    fn test_system_markers() {
        let mut marked = column(1, "Last Edit");
        marked.system_column_type = Some("MODIFIED_DATE".into());
        assert!(is_system_column(&marked));

        let mut typed = column(2, "Auto");
        typed.column_type = Some("SYSTEM".into());
        assert!(is_system_column(&typed));

        assert!(is_system_column(&column(3, "Modified By")));
        assert!(!is_system_column(&column(4, "Created")));
    }
}
