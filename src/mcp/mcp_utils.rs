use crate::commands::Out;
use crate::restore::BackupResult;
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData;
use serde::Serialize;
use std::fmt::Debug;
use tracing::error;

pub(super) fn to_content<T>(out: Out<T>) -> Vec<Content>
where
    T: Debug + Clone + Serialize,
{
    let mut content = vec![Content::text(out.message())];
    if let Some(object) = out.structure() {
        match Content::json(object) {
            Ok(json) => content.push(json),
            Err(e) => error!("Unable to serialize JSON output: {e}"),
        };
    }
    content
}

pub(super) fn tool_result<T>(result: crate::Result<Out<T>>) -> Result<CallToolResult, ErrorData>
where
    T: Debug + Clone + Serialize,
{
    Ok(match result {
        Ok(out) => CallToolResult::success(to_content(out)),
        Err(e) => {
            error!("{e:#}");
            CallToolResult::error(vec![Content::text(format!("{e:#}"))])
        }
    })
}

/// Like `tool_result`, but a failed reconstruction is flagged as a tool error while still
/// carrying its structured failure.
pub(super) fn backup_tool_result(
    result: crate::Result<Out<BackupResult>>,
) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(out) if out.structure().is_some_and(|r| !r.is_success()) => {
            Ok(CallToolResult::error(to_content(out)))
        }
        other => tool_result(other),
    }
}
