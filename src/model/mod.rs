//! The Smartsheet data model as this crate sees it.
//!
//! Read-side types (`Sheet`, `Row`, `Cell`, `CellHistoryEntry`, ...) are deserialized from the
//! service's JSON and keep unknown nested objects (hyperlinks, images, object values) as opaque
//! `serde_json::Value`s. The write-side `CellWrite` encodes the service's cell exclusivity rules
//! in its types.

mod history;
mod sheet;
mod write;

pub use history::{CellHistoryEntry, HistoricalValue};
pub use sheet::{
    Cell, Column, Folder, Page, ResultEnvelope, Row, Sheet, SheetLocation, SheetSummary,
    WorkspaceRef,
};
pub use write::{CellContent, CellLinks, CellStyle, CellWrite, NewRow};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parses a timestamp as the service or a caller may express it: RFC 3339 (`2025-03-27T17:00:00Z`),
/// a naive date-time which is taken to be UTC (`2025-03-27T17:00:00`), or a bare date which is
/// taken to be midnight UTC (`2025-03-27`).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}
