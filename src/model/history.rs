use crate::model::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One immutable past state of a single cell, as returned by the cell history endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellHistoryEntry {
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_in_from_cell: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_out_to_cells: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl CellHistoryEntry {
    /// The parsed modification time, or `None` if the entry has no usable timestamp.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified_at.as_deref().and_then(parse_timestamp)
    }
}

/// The state of a cell in effect at a target time. Only the fields that were present on the
/// chosen history entry are `Some`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_in_from_cell: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_out_to_cells: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
}

impl From<&CellHistoryEntry> for HistoricalValue {
    fn from(entry: &CellHistoryEntry) -> Self {
        Self {
            value: entry.value.clone(),
            display_value: entry.display_value.clone(),
            formula: entry.formula.clone(),
            format: entry.format.clone(),
            conditional_format: entry.conditional_format.clone(),
            hyperlink: entry.hyperlink.clone(),
            image: entry.image.clone(),
            link_in_from_cell: entry.link_in_from_cell.clone(),
            links_out_to_cells: entry.links_out_to_cells.clone(),
            object_value: entry.object_value.clone(),
            override_validation: entry.override_validation,
            strict: entry.strict,
            column_type: entry.column_type.clone(),
        }
    }
}
