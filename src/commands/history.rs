//! The `history` command: show every recorded revision of one cell.

use crate::api::{self, Api};
use crate::args::HistoryArgs;
use crate::commands::Out;
use crate::model::{parse_timestamp, CellHistoryEntry, HistoricalValue};
use crate::restore::resolve;
use crate::{Config, Result};
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write;

/// History fields requested for display.
const INCLUDE: &str = "columnType,formula,format,hyperlink,objectValue";

/// A cell's revisions, newest first, and optionally the one in effect at `at`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    pub entries: Vec<CellHistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_at: Option<HistoricalValue>,
}

pub async fn history(config: Config, args: HistoryArgs) -> Result<Out<HistoryReport>> {
    let api = api::http_api(&config)?;
    cell_history(
        &api,
        args.sheet_id(),
        args.row_id(),
        args.column_id(),
        args.at(),
    )
    .await
}

pub(crate) async fn cell_history(
    api: &Api,
    sheet_id: i64,
    row_id: i64,
    column_id: i64,
    at: Option<&str>,
) -> Result<Out<HistoryReport>> {
    let target = at
        .map(|s| parse_timestamp(s).with_context(|| format!("Invalid timestamp '{s}'")))
        .transpose()?;
    let entries = api
        .get_cell_history(sheet_id, row_id, column_id, Some(INCLUDE))
        .await
        .with_context(|| format!("Unable to get the history of row {row_id} column {column_id}"))?;

    let mut message = format!(
        "{} revisions of row {row_id} column {column_id}",
        entries.len()
    );
    for entry in &entries {
        let _ = write!(
            message,
            "\n  {}  {}",
            entry.modified_at.as_deref().unwrap_or("(no date)"),
            describe(entry.formula.as_deref(), entry.value.as_ref())
        );
    }

    let value_at = target.and_then(|t| resolve(&entries, t));
    if let Some(at) = at {
        let _ = match &value_at {
            Some(v) => write!(
                message,
                "\nAt {at}: {}",
                describe(v.formula.as_deref(), v.value.as_ref())
            ),
            None => write!(message, "\nAt {at}: no revision yet"),
        };
    }

    Ok(Out::new(
        message,
        HistoryReport {
            entries,
            at: at.map(str::to_string),
            value_at,
        },
    ))
}

fn describe(formula: Option<&str>, value: Option<&serde_json::Value>) -> String {
    match (formula, value) {
        (Some(formula), _) => formula.to_string(),
        (None, Some(value)) => value.to_string(),
        (None, None) => "(empty)".to_string(),
    }
}
