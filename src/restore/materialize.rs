//! Turns the resolved state of a cell into a write payload for the archive sheet.

use crate::model::{Cell, CellContent, CellLinks, CellStyle, CellWrite, Column, HistoricalValue};
use tracing::trace;

/// Columns with this title are always written with `DURATION_FORMULA`.
pub const DURATION_COLUMN: &str = "Duration";
pub const DURATION_FORMULA: &str = "=[Start Date]@row - [End Date]@row";

/// Builds the payload for one cell of `column`, written to `target_column_id`.
///
/// Content, first match wins:
/// 1. a `Duration` column gets `DURATION_FORMULA`;
/// 2. with `include_formulas`, the historical formula or else the current cell's formula;
/// 3. with a historical value, its object value (historical, then current) or its literal value;
/// 4. otherwise an explicit null.
///
/// The format is always taken from history, then the current cell, then the column default.
/// Conditional format and validation flags only come with a historical value. Links come with a
/// historical value too, each preferring history over the current cell, and never accompany a
/// formula.
pub fn materialize(
    column: &Column,
    historical: Option<&HistoricalValue>,
    current: Option<&Cell>,
    target_column_id: i64,
    include_formulas: bool,
) -> CellWrite {
    let content = content(column, historical, current, include_formulas);
    trace!("'{}' -> {:?}", column.title, content);

    let format = historical
        .and_then(|h| h.format.clone())
        .or_else(|| current.and_then(|c| c.format.clone()))
        .or_else(|| column.format.clone());
    let style = match historical {
        Some(h) => CellStyle {
            format,
            conditional_format: h.conditional_format.clone(),
            override_validation: h.override_validation,
            strict: h.strict,
        },
        None => CellStyle {
            format,
            ..Default::default()
        },
    };

    CellWrite {
        column_id: target_column_id,
        content,
        style,
    }
}

fn content(
    column: &Column,
    historical: Option<&HistoricalValue>,
    current: Option<&Cell>,
    include_formulas: bool,
) -> CellContent {
    if column.title == DURATION_COLUMN {
        return CellContent::Formula(DURATION_FORMULA.to_string());
    }

    if include_formulas {
        let formula = historical
            .and_then(|h| h.formula.clone())
            .or_else(|| current.and_then(|c| c.formula.clone()));
        if let Some(formula) = formula {
            return CellContent::Formula(formula);
        }
    }

    let Some(h) = historical else {
        return CellContent::null();
    };
    let links = CellLinks {
        hyperlink: h
            .hyperlink
            .clone()
            .or_else(|| current.and_then(|c| c.hyperlink.clone())),
        image: h
            .image
            .clone()
            .or_else(|| current.and_then(|c| c.image.clone())),
        link_in_from_cell: h
            .link_in_from_cell
            .clone()
            .or_else(|| current.and_then(|c| c.link_in_from_cell.clone())),
        links_out_to_cells: h
            .links_out_to_cells
            .clone()
            .or_else(|| current.and_then(|c| c.links_out_to_cells.clone())),
    };
    let object_value = h
        .object_value
        .clone()
        .or_else(|| current.and_then(|c| c.object_value.clone()));
    match object_value {
        Some(object_value) => CellContent::Object {
            object_value,
            links,
        },
        None => CellContent::Literal {
            value: h.value.clone().unwrap_or_default(),
            links,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::column;
    use rand::Rng;
    use serde_json::{json, Value};

    fn historical(value: &str) -> HistoricalValue {
        HistoricalValue {
            value: Some(json!(value)),
            ..Default::default()
        }
    }

    #[test]
    fn test_duration_column_always_gets_fixed_formula() {
        let col = column(1, "Duration");
        let mut h = historical("5");
        h.formula = Some("=2+3".into());
        let current = Cell {
            value: Some(json!(7)),
            formula: Some("=3+4".into()),
            ..Default::default()
        };
        for (h, c, formulas) in [
            (Some(&h), Some(&current), true),
            (None, None, false),
            (Some(&h), None, false),
        ] {
            let got = materialize(&col, h, c, 10, formulas);
            assert_eq!(got.content, CellContent::Formula(DURATION_FORMULA.into()));
            assert_eq!(got.column_id, 10);
        }
    }

    #[test]
    fn test_historical_formula_beats_current_formula() {
        let mut h = historical("ignored");
        h.formula = Some("=A".into());
        let current = Cell {
            formula: Some("=B".into()),
            ..Default::default()
        };
        let got = materialize(&column(1, "Total"), Some(&h), Some(&current), 1, true);
        assert_eq!(got.content, CellContent::Formula("=A".into()));

        let got = materialize(&column(1, "Total"), None, Some(&current), 1, true);
        assert_eq!(got.content, CellContent::Formula("=B".into()));
    }

    #[test]
    fn test_formulas_disabled_uses_value() {
        let mut h = historical("42");
        h.formula = Some("=40+2".into());
        let got = materialize(&column(1, "Total"), Some(&h), None, 1, false);
        assert_eq!(
            got.content,
            CellContent::Literal {
                value: json!("42"),
                links: CellLinks::default()
            }
        );
    }

    #[test]
    fn test_missing_history_is_explicit_null() {
        let current = Cell {
            value: Some(json!("now")),
            hyperlink: Some(json!({"url": "https://example.com"})),
            ..Default::default()
        };
        let got = materialize(&column(1, "Name"), None, Some(&current), 1, true);
        assert_eq!(got.content, CellContent::null());
        let json = serde_json::to_value(&got).unwrap();
        assert_eq!(json["value"], Value::Null);
        assert!(json.get("hyperlink").is_none());
    }

    #[test]
    fn test_historical_value_without_value_field_is_null() {
        let h = HistoricalValue {
            format: Some(",,1".into()),
            ..Default::default()
        };
        let got = materialize(&column(1, "Name"), Some(&h), None, 1, true);
        assert!(matches!(
            got.content,
            CellContent::Literal { value: Value::Null, .. }
        ));
        assert_eq!(got.style.format.as_deref(), Some(",,1"));
    }

    #[test]
    fn test_format_fallback_chain() {
        let mut col = column(1, "Name");
        col.format = Some("column".into());
        let current = Cell {
            format: Some("current".into()),
            ..Default::default()
        };
        let mut h = historical("x");

        let got = materialize(&col, Some(&h), Some(&current), 1, true);
        assert_eq!(got.style.format.as_deref(), Some("current"));

        h.format = Some("history".into());
        let got = materialize(&col, Some(&h), Some(&current), 1, true);
        assert_eq!(got.style.format.as_deref(), Some("history"));

        let got = materialize(&col, None, None, 1, true);
        assert_eq!(got.style.format.as_deref(), Some("column"));
    }

    #[test]
    fn test_object_value_replaces_value_and_keeps_links() {
        let mut h = historical("Ada");
        h.object_value = Some(json!({"objectType": "CONTACT", "email": "ada@example.com"}));
        h.link_in_from_cell = Some(json!({"sheetId": 5}));
        h.strict = Some(false);
        h.conditional_format = Some("cf".into());
        let current = Cell {
            image: Some(json!({"id": "img"})),
            ..Default::default()
        };
        let got = materialize(&column(1, "Owner"), Some(&h), Some(&current), 1, true);
        let json = serde_json::to_value(&got).unwrap();
        assert!(json.get("value").is_none());
        assert_eq!(json["objectValue"]["objectType"], "CONTACT");
        assert_eq!(json["linkInFromCell"]["sheetId"], 5);
        assert_eq!(json["image"]["id"], "img");
        assert_eq!(json["strict"], false);
        assert_eq!(json["conditionalFormat"], "cf");
    }

    #[test]
    fn test_current_object_value_is_used_when_history_has_none() {
        let h = historical("x");
        let current = Cell {
            object_value: Some(json!({"objectType": "MULTI_PICKLIST", "values": ["a"]})),
            ..Default::default()
        };
        let got = materialize(&column(1, "Tags"), Some(&h), Some(&current), 1, true);
        assert!(matches!(got.content, CellContent::Object { .. }));
    }

    #[test]
    fn test_cell_links_fall_back_to_current_cell() {
        let h = historical("A");
        let current = Cell {
            link_in_from_cell: Some(json!({"sheetId": 9, "rowId": 1})),
            links_out_to_cells: Some(json!([{"sheetId": 8, "rowId": 2}])),
            ..Default::default()
        };
        let got = materialize(&column(1, "Name"), Some(&h), Some(&current), 1, true);
        let json = serde_json::to_value(&got).unwrap();
        assert_eq!(json["value"], "A");
        assert_eq!(json["linkInFromCell"]["sheetId"], 9);
        assert_eq!(json["linksOutToCells"][0]["sheetId"], 8);

        let mut h = historical("A");
        h.link_in_from_cell = Some(json!({"sheetId": 1}));
        let got = materialize(&column(1, "Name"), Some(&h), Some(&current), 1, true);
        let json = serde_json::to_value(&got).unwrap();
        assert_eq!(json["linkInFromCell"]["sheetId"], 1);
        assert_eq!(json["linksOutToCells"][0]["sheetId"], 8);
    }

    fn maybe(rng: &mut impl Rng, v: Value) -> Option<Value> {
        rng.gen_bool(0.5).then_some(v)
    }

    /// No combination of inputs produces a formula next to links or an object value.
    #[test]
    fn test_formula_never_mixed_with_links_or_object() {
        let mut rng = rand::thread_rng();
        let titles = ["Name", "Duration", "Owner"];
        for _ in 0..500 {
            let h = HistoricalValue {
                value: maybe(&mut rng, json!("v")),
                formula: rng.gen_bool(0.5).then(|| "=1".to_string()),
                hyperlink: maybe(&mut rng, json!({"url": "u"})),
                image: maybe(&mut rng, json!({"id": "i"})),
                link_in_from_cell: maybe(&mut rng, json!({"rowId": 1})),
                links_out_to_cells: maybe(&mut rng, json!([{"rowId": 2}])),
                object_value: maybe(&mut rng, json!({"objectType": "X"})),
                ..Default::default()
            };
            let current = Cell {
                value: maybe(&mut rng, json!("c")),
                formula: rng.gen_bool(0.5).then(|| "=2".to_string()),
                hyperlink: maybe(&mut rng, json!({"url": "cu"})),
                image: maybe(&mut rng, json!({"id": "ci"})),
                link_in_from_cell: maybe(&mut rng, json!({"rowId": 3})),
                links_out_to_cells: maybe(&mut rng, json!([{"rowId": 4}])),
                object_value: maybe(&mut rng, json!({"objectType": "Y"})),
                ..Default::default()
            };
            let col = column(1, titles[rng.gen_range(0..titles.len())]);
            let historical = rng.gen_bool(0.7).then_some(&h);
            let current = rng.gen_bool(0.7).then_some(&current);
            let got = materialize(&col, historical, current, 1, rng.gen_bool(0.5));

            let json = serde_json::to_value(&got).unwrap();
            let content_fields = ["formula", "value", "objectValue"]
                .iter()
                .filter(|f| json.get(**f).is_some())
                .count();
            assert_eq!(content_fields, 1, "{json}");
            if json.get("formula").is_some() {
                for field in ["hyperlink", "image", "objectValue", "linkInFromCell", "linksOutToCells"] {
                    assert!(json.get(field).is_none(), "{json}");
                }
            }
        }
    }
}
