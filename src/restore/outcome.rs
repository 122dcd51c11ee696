//! The structured result of a reconstruction run.

use crate::api::ApiError;
use crate::restore::batch::CellFailure;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

static COLUMN_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"columnId (\d+)").ok());

/// The error codes a failed run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ResourceNotFound,
    PermissionDenied,
    RateLimitExceeded,
    InvalidColumnId,
    ArchiveFailed,
}

serde_plain::derive_display_from_serialize!(ErrorCode);

/// Either `{ success: true, message, details }` or `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackupResult {
    Success(BackupSuccess),
    Failure(BackupFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSuccess {
    pub success: bool,
    pub message: String,
    pub details: BackupDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDetails {
    pub source_sheet_id: i64,
    pub archive_sheet_id: i64,
    pub archive_sheet_name: String,
    pub timestamp: String,
    /// Source rows with at least one cell resolved from history.
    pub rows_processed: usize,
    /// Cells whose history was fetched.
    pub cells_processed: usize,
    /// Rows with a counterpart in the archive and at least one writable resolved cell.
    pub rows_updated: usize,
    pub cells_failed: usize,
    pub failed_cells: Vec<CellFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupFailure {
    pub success: bool,
    pub error: FailureError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
}

impl BackupResult {
    pub fn success(details: BackupDetails) -> Self {
        BackupResult::Success(BackupSuccess {
            success: true,
            message: format!("Archive sheet created with data from {}", details.timestamp),
            details,
        })
    }

    /// Classifies `error` into the failure taxonomy. `sheet_id` and `timestamp` are echoed as the
    /// caller supplied them.
    pub fn failure(error: &anyhow::Error, sheet_id: &str, timestamp: &str) -> Self {
        let message = format!("{error:#}");
        let mut details = Map::new();
        details.insert("sheetId".into(), json!(sheet_id));
        details.insert("timestamp".into(), json!(timestamp));

        let api = error.chain().find_map(|e| e.downcast_ref::<ApiError>());
        if let Some(error_code) = api.and_then(ApiError::error_code) {
            details.insert("errorCode".into(), json!(error_code));
        }
        let upstream_message = api.map(ApiError::message).unwrap_or_else(|| message.clone());
        let code = match api {
            Some(api) if api.is_not_found() => {
                let resource_type = api
                    .detail()
                    .and_then(|d| d.get("resourceType"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                details.insert("resourceType".into(), json!(resource_type));
                ErrorCode::ResourceNotFound
            }
            Some(api) if api.is_permission_denied() => ErrorCode::PermissionDenied,
            Some(api) if api.is_rate_limited() => {
                if let Some(retry_after) = api.retry_after() {
                    details.insert("retryAfter".into(), json!(retry_after.as_secs()));
                }
                ErrorCode::RateLimitExceeded
            }
            _ if upstream_message.contains("INVALID_COLUMN_ID") => {
                if let Some(column_id) = column_id_in(&upstream_message) {
                    details.insert("columnId".into(), json!(column_id));
                }
                ErrorCode::InvalidColumnId
            }
            _ => ErrorCode::ArchiveFailed,
        };

        BackupResult::Failure(BackupFailure {
            success: false,
            error: FailureError {
                code,
                message,
                details: Value::Object(details),
            },
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BackupResult::Success(_))
    }

    /// A one-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        match self {
            BackupResult::Success(s) => format!(
                "{} (archive sheet {} '{}', {} rows, {} cells, {} cells failed)",
                s.message,
                s.details.archive_sheet_id,
                s.details.archive_sheet_name,
                s.details.rows_updated,
                s.details.cells_processed,
                s.details.cells_failed
            ),
            BackupResult::Failure(f) => {
                format!("Archive failed [{}]: {}", f.error.code, f.error.message)
            }
        }
    }
}

fn column_id_in(message: &str) -> Option<String> {
    COLUMN_ID
        .as_ref()?
        .captures(message)
        .map(|c| c[1].to_string())
}
