//! Runs per-cell lookups a batch at a time, absorbing individual failures.

use crate::restore::existence::CellRef;
use crate::utils::chunks;
use crate::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// A lookup that failed and was left out of the reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFailure {
    pub row_id: i64,
    pub column_id: i64,
    pub error: String,
}

/// The fold of every batch: the lookups that worked, with their results, and those that did not.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<(CellRef, T)>,
    pub failed: Vec<CellFailure>,
}

/// Calls `fetch` for every cell. Cells are taken `concurrency` at a time; the lookups of one batch
/// are in flight together and all of them finish before the next batch starts. `delay` separates
/// consecutive batches. A failed lookup is logged and recorded, it never stops the run.
pub async fn fetch_in_batches<T, F, Fut>(
    cells: &[CellRef],
    concurrency: usize,
    delay: Duration,
    fetch: F,
) -> BatchOutcome<T>
where
    F: Fn(CellRef) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut outcome = BatchOutcome {
        succeeded: Vec::with_capacity(cells.len()),
        failed: Vec::new(),
    };
    let batches: Vec<&[CellRef]> = chunks(cells, concurrency).collect();
    let total = batches.len();

    for (i, batch) in batches.into_iter().enumerate() {
        info!("Processing batch {}/{total} ({} cells)", i + 1, batch.len());
        let results = join_all(batch.iter().map(|cell| fetch(*cell))).await;
        for (cell, result) in batch.iter().zip(results) {
            match result {
                Ok(value) => outcome.succeeded.push((*cell, value)),
                Err(e) => {
                    warn!(
                        "Could not get history for row {} column {}: {e:#}",
                        cell.row_id, cell.column_id
                    );
                    outcome.failed.push(CellFailure {
                        row_id: cell.row_id,
                        column_id: cell.column_id,
                        error: format!("{e:#}"),
                    });
                }
            }
        }
        if i + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    outcome
}
