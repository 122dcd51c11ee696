//! The `backup` command: rebuild a sheet as of an earlier time into an archive sheet.

use crate::api::{self, Api};
use crate::args::BackupArgs;
use crate::commands::Out;
use crate::restore::{self, BackupRequest, BackupResult, BackupSettings};
use crate::{Config, Result};
use anyhow::{bail, Context};
use tracing::{debug, error};

/// Runs one reconstruction against the live service and reports the structured result.
///
/// A failed reconstruction is still returned as a structured result by the workflow; here it is
/// turned into an error so that the process exits with a failure status.
pub async fn backup(config: Config, args: BackupArgs) -> Result<Out<BackupResult>> {
    let api = api::http_api(&config)?;
    let request = BackupRequest {
        sheet_id: args.sheet_id().to_string(),
        timestamp: args.timestamp().to_string(),
        archive_name: args.archive_name().map(str::to_string),
        include_formulas: args.include_formulas(),
        include_formatting: args.include_formatting(),
        batch_size: args.batch_size(),
        max_concurrent_requests: args.max_concurrent_requests(),
    };
    let out = run_backup(&api, config.backup(), &request).await?;
    match out.structure() {
        Some(result) if !result.is_success() => {
            error!("{}", out.message());
            bail!("{}", result.summary())
        }
        _ => Ok(out),
    }
}

/// Runs the workflow and packages its result. Only serialization can fail here, a failed run is
/// reported inside the `BackupResult`.
pub(crate) async fn run_backup(
    api: &Api,
    settings: BackupSettings,
    request: &BackupRequest,
) -> Result<Out<BackupResult>> {
    debug!("Backup requested: {request:?}");
    let result = restore::create_version_backup(api, settings, request).await;
    let json = serde_json::to_string_pretty(&result).context("Unable to serialize the result")?;
    Ok(Out::new(format!("{}\n{json}", result.summary()), result))
}
