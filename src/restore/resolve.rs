//! Picks the revision of a cell that was in effect at a point in time.

use crate::model::{CellHistoryEntry, HistoricalValue};
use chrono::{DateTime, Utc};
use tracing::{trace, warn};

/// Returns the state of a cell at `target`: the history entry with the greatest modification time
/// that is not after `target`, or `None` when every entry postdates it.
///
/// Entries are ordered newest first with a stable sort, so among entries sharing a timestamp the
/// one that appears first in `entries` wins. Entries without a parseable `modifiedAt` cannot be
/// placed in time and are ignored.
pub fn resolve(entries: &[CellHistoryEntry], target: DateTime<Utc>) -> Option<HistoricalValue> {
    let mut dated: Vec<(DateTime<Utc>, &CellHistoryEntry)> = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.modified() {
            Some(modified) => dated.push((modified, entry)),
            None => warn!(
                "Ignoring a history entry with unusable timestamp {:?}",
                entry.modified_at
            ),
        }
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let found = dated
        .into_iter()
        .find(|(modified, _)| *modified <= target)
        .map(|(modified, entry)| {
            trace!("Using the revision from {modified} for {target}");
            HistoricalValue::from(entry)
        });
    if found.is_none() {
        trace!("No revision at or before {target}");
    }
    found
}
