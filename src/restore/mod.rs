//! Rebuilds a sheet as it was at a past moment into an archive copy.
//!
//! The run is linear: find the source sheet's workspace, make sure a `Backup of <name>` folder
//! exists there, copy the sheet into it, work out which cells to look up, resolve each cell's
//! history at the target time (a batch at a time), map source rows and columns onto the copy, and
//! finally replace the copy's rows with the reconstructed ones. Any error ends the run with a
//! structured failure instead of propagating.
//!
//! The archive is not locked while rows are replaced, and a failure after the delete leaves it
//! partially filled.

mod batch;
mod existence;
mod identity;
mod materialize;
mod outcome;
mod resolve;

pub use batch::{fetch_in_batches, BatchOutcome, CellFailure};
pub use existence::{candidates, CellRef};
pub use identity::{is_system_column, map_columns, map_rows, system_column_ids};
pub use materialize::{materialize, DURATION_COLUMN, DURATION_FORMULA};
pub use outcome::{BackupDetails, BackupFailure, BackupResult, BackupSuccess, ErrorCode};
pub use resolve::resolve;

use crate::api::{Api, Destination, SheetQuery};
use crate::model::{parse_timestamp, Folder, HistoricalValue, NewRow, Sheet};
use crate::utils::chunks;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, error, info};

/// History fields always requested for a cell.
const HISTORY_INCLUDE: &str = "columnType,formula,format";
/// History fields additionally requested when formatting is reconstructed.
const HISTORY_INCLUDE_FORMATTING: &str = "conditionalFormat,hyperlink,image,objectValue";

/// Tuning for reconstruction runs, from the config file or built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Rows per add or delete request against the archive.
    pub batch_size: usize,
    /// History lookups in flight at once.
    pub max_concurrent_requests: usize,
    /// Pause between consecutive batches.
    pub batch_delay_ms: u64,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrent_requests: 5,
            batch_delay_ms: 100,
        }
    }
}

/// One request to reconstruct a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupRequest {
    pub sheet_id: String,
    pub timestamp: String,
    pub archive_name: Option<String>,
    pub include_formulas: bool,
    pub include_formatting: bool,
    pub batch_size: Option<usize>,
    pub max_concurrent_requests: Option<usize>,
}

impl BackupRequest {
    pub fn new(sheet_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            timestamp: timestamp.into(),
            archive_name: None,
            include_formulas: true,
            include_formatting: true,
            batch_size: None,
            max_concurrent_requests: None,
        }
    }
}

/// Creates an archive copy of `request.sheet_id` holding the data as of `request.timestamp`.
pub async fn create_version_backup(
    api: &Api,
    settings: BackupSettings,
    request: &BackupRequest,
) -> BackupResult {
    match run(api, settings, request).await {
        Ok(details) => {
            let result = BackupResult::success(details);
            info!("{}", result.summary());
            result
        }
        Err(e) => {
            error!("Archive sheet creation failed: {e:#}");
            BackupResult::failure(&e, &request.sheet_id, &request.timestamp)
        }
    }
}

async fn run(api: &Api, settings: BackupSettings, request: &BackupRequest) -> Result<BackupDetails> {
    let target = parse_timestamp(&request.timestamp).with_context(|| {
        format!(
            "Invalid timestamp '{}', expected an ISO-8601 date or date-time",
            request.timestamp
        )
    })?;
    let sheet_id: i64 = request
        .sheet_id
        .trim()
        .parse()
        .with_context(|| format!("Invalid sheet id '{}'", request.sheet_id))?;
    let batch_size = request.batch_size.unwrap_or(settings.batch_size).max(1);
    let concurrency = request
        .max_concurrent_requests
        .unwrap_or(settings.max_concurrent_requests)
        .max(1);
    let delay = Duration::from_millis(settings.batch_delay_ms);

    info!("Getting source sheet details for {sheet_id}");
    let source: Sheet = api
        .get_sheet(sheet_id, &SheetQuery::include("format"))
        .await?;
    let workspace = source
        .workspace
        .as_ref()
        .context("Sheet must be in a workspace to create an archive")?;

    let folder = ensure_backup_folder(api, workspace.id, &source.name).await?;

    let archive_name = request
        .archive_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| default_archive_name(target), str::to_string);
    info!("Creating archive sheet '{archive_name}' in folder {}", folder.id);
    let copy = api
        .copy_sheet(sheet_id, &archive_name, Destination::Folder(folder.id), Some("data"))
        .await?;
    let archive: Sheet = api.get_sheet(copy.id, &SheetQuery::default()).await?;

    let cells = candidates(&source, target);
    info!("Found {} cells to look up as of {target}", cells.len());

    let include = history_include(request.include_formatting);
    let include = include.as_str();
    let fetched = fetch_in_batches(&cells, concurrency, delay, |cell| async move {
        let entries = api
            .get_cell_history(sheet_id, cell.row_id, cell.column_id, Some(include))
            .await?;
        Ok(resolve(&entries, target))
    })
    .await;

    let cells_processed = fetched.succeeded.len();
    let mut historical: HashMap<i64, HashMap<i64, HistoricalValue>> = HashMap::new();
    for (cell, value) in fetched.succeeded {
        if let Some(value) = value {
            historical
                .entry(cell.row_id)
                .or_default()
                .insert(cell.column_id, value);
        }
    }

    let column_map = map_columns(&source.columns, &archive.columns);
    let row_map = map_rows(&source.rows, &archive.rows);
    let system_ids = system_column_ids(&archive.columns);
    let rows_updated = count_rows_updated(&historical, &row_map, &column_map, &system_ids);

    let rows = build_rows(
        &source,
        &historical,
        &column_map,
        &system_ids,
        request.include_formulas,
    );
    replace_rows(api, &archive, &rows, batch_size, delay).await?;

    Ok(BackupDetails {
        source_sheet_id: sheet_id,
        archive_sheet_id: archive.id,
        archive_sheet_name: archive_name,
        timestamp: request.timestamp.clone(),
        rows_processed: historical.len(),
        cells_processed,
        rows_updated,
        cells_failed: fetched.failed.len(),
        failed_cells: fetched.failed,
    })
}

/// Finds the workspace folder named `Backup of <sheet_name>`, creating it when missing.
pub(crate) async fn ensure_backup_folder(
    api: &Api,
    workspace_id: i64,
    sheet_name: &str,
) -> Result<Folder> {
    let name = format!("Backup of {sheet_name}");
    let folders = api.list_workspace_folders(workspace_id).await?;
    if let Some(folder) = folders.into_iter().find(|f| f.name == name) {
        info!("Found existing backup folder '{name}' ({})", folder.id);
        return Ok(folder);
    }
    let folder = api.create_workspace_folder(workspace_id, &name).await?;
    info!("Created backup folder '{name}' ({})", folder.id);
    Ok(folder)
}

fn default_archive_name(target: DateTime<Utc>) -> String {
    format!("Version as of {}", target.format("%Y-%m-%d %H:%M:%S UTC"))
}

fn history_include(include_formatting: bool) -> String {
    if include_formatting {
        format!("{HISTORY_INCLUDE},{HISTORY_INCLUDE_FORMATTING}")
    } else {
        HISTORY_INCLUDE.to_string()
    }
}

fn count_rows_updated(
    historical: &HashMap<i64, HashMap<i64, HistoricalValue>>,
    row_map: &HashMap<i64, i64>,
    column_map: &HashMap<i64, i64>,
    system_ids: &HashSet<i64>,
) -> usize {
    historical
        .iter()
        .filter(|(row_id, _)| row_map.contains_key(*row_id))
        .filter(|(_, cells)| {
            cells.keys().any(|column_id| {
                column_map
                    .get(column_id)
                    .is_some_and(|target| !system_ids.contains(target))
            })
        })
        .count()
}

/// The reconstructed rows, in source order. Only source rows with at least one resolved cell are
/// rebuilt; each carries every mapped, writable column.
fn build_rows(
    source: &Sheet,
    historical: &HashMap<i64, HashMap<i64, HistoricalValue>>,
    column_map: &HashMap<i64, i64>,
    system_ids: &HashSet<i64>,
    include_formulas: bool,
) -> Vec<NewRow> {
    let mut rows = Vec::new();
    for row in &source.rows {
        let Some(resolved) = historical.get(&row.id) else {
            continue;
        };
        let mut cells = Vec::new();
        for column in &source.columns {
            let Some(&target_column_id) = column_map.get(&column.id) else {
                continue;
            };
            if system_ids.contains(&target_column_id) || is_system_column(column) {
                debug!("Skipping system column '{}'", column.title);
                continue;
            }
            cells.push(materialize(
                column,
                resolved.get(&column.id),
                row.cell(column.id),
                target_column_id,
                include_formulas,
            ));
        }
        if !cells.is_empty() {
            rows.push(NewRow {
                to_bottom: true,
                cells,
            });
        }
    }
    rows
}

/// Deletes every row of the archive, then adds `rows`, both in batches of `batch_size`.
async fn replace_rows(
    api: &Api,
    archive: &Sheet,
    rows: &[NewRow],
    batch_size: usize,
    delay: Duration,
) -> Result<()> {
    let existing: Vec<i64> = archive.rows.iter().map(|r| r.id).collect();
    if !existing.is_empty() {
        info!("Deleting {} existing rows in the archive sheet", existing.len());
        for ids in chunks(&existing, batch_size) {
            api.delete_rows(archive.id, ids, true)
                .await
                .context("Unable to clear the archive sheet")?;
        }
    }

    let batches: Vec<&[NewRow]> = chunks(rows, batch_size).collect();
    info!("Adding {} rows in {} batches", rows.len(), batches.len());
    for (i, batch) in batches.iter().enumerate() {
        debug!("Adding batch {}/{} ({} rows)", i + 1, batches.len(), batch.len());
        api.add_rows(archive.id, *batch)
            .await
            .context("Unable to add rows to the archive sheet")?;
        if i + 1 < batches.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(())
}
