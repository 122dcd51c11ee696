//! These structs provide the CLI interface for the smartsheet-mcp program.

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// smartsheet-mcp: Smartsheet tools for AI agents, and point-in-time sheet archives.
///
/// The main purpose of this program is to run as an MCP server (see the mcp subcommand) so that
/// an AI agent can read and edit Smartsheet sheets, discussions, workspaces and folders. It can
/// also rebuild a sheet as it looked at an earlier moment, from cell history, into a new archive
/// sheet.
///
/// You need a Smartsheet API access token. Pass it with --api-key or set SMARTSHEET_API_KEY.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the MCP server on stdin/stdout.
    ///
    /// This is meant to be launched by an MCP client. Logs go to stderr.
    Mcp,
    /// Create an archive sheet holding the data a sheet had at an earlier point in time.
    Backup(BackupArgs),
    /// Print the history of a single cell.
    History(HistoryArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The Smartsheet API access token.
    #[arg(long, env = "SMARTSHEET_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// The Smartsheet API base URL. Defaults to https://api.smartsheet.com/2.0
    #[arg(long, env = "SMARTSHEET_ENDPOINT")]
    endpoint: Option<String>,

    /// Allow the MCP tools that delete data (true/false).
    #[arg(long, env = "ALLOW_DELETE_TOOLS", value_parser = BoolishValueParser::new())]
    allow_delete: Option<bool>,

    /// The config file. Defaults to smartsheet-mcp/config.json in your config directory.
    #[arg(long, env = "SMARTSHEET_MCP_CONFIG")]
    config: Option<DisplayPath>,
}

impl Common {
    pub fn new(log_level: LevelFilter) -> Self {
        Self {
            log_level,
            api_key: None,
            endpoint: None,
            allow_delete: None,
            config: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_allow_delete(mut self, allow_delete: bool) -> Self {
        self.allow_delete = Some(allow_delete);
        self
    }

    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = Some(DisplayPath(config.into()));
        self
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn allow_delete(&self) -> Option<bool> {
        self.allow_delete
    }

    /// The config file path, either the one given or the default location.
    pub fn config(&self) -> Option<DisplayPath> {
        self.config.clone().or_else(default_config_path)
    }
}

/// Args for the `smartsheet-mcp backup` command.
#[derive(Debug, Parser, Clone)]
pub struct BackupArgs {
    /// The id of the sheet to reconstruct.
    #[arg(long)]
    sheet_id: String,

    /// The point in time to reconstruct, e.g. 2025-03-01T12:00:00Z or 2025-03-01.
    #[arg(long)]
    timestamp: String,

    /// The name of the archive sheet. Defaults to "Version as of <timestamp>".
    #[arg(long)]
    archive_name: Option<String>,

    /// Write historical values instead of formulas.
    #[arg(long)]
    no_formulas: bool,

    /// Skip conditional formats, links, images and object values.
    #[arg(long)]
    no_formatting: bool,

    /// Rows per request when rewriting the archive sheet.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Cell history requests in flight at once.
    #[arg(long)]
    max_concurrent_requests: Option<usize>,
}

impl BackupArgs {
    pub fn new(sheet_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            timestamp: timestamp.into(),
            archive_name: None,
            no_formulas: false,
            no_formatting: false,
            batch_size: None,
            max_concurrent_requests: None,
        }
    }

    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn archive_name(&self) -> Option<&str> {
        self.archive_name.as_deref()
    }

    pub fn include_formulas(&self) -> bool {
        !self.no_formulas
    }

    pub fn include_formatting(&self) -> bool {
        !self.no_formatting
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    pub fn max_concurrent_requests(&self) -> Option<usize> {
        self.max_concurrent_requests
    }
}

/// Args for the `smartsheet-mcp history` command.
#[derive(Debug, Parser, Clone)]
pub struct HistoryArgs {
    #[arg(long)]
    sheet_id: i64,

    #[arg(long)]
    row_id: i64,

    #[arg(long)]
    column_id: i64,

    /// Also show the revision that was current at this time.
    #[arg(long)]
    at: Option<String>,
}

impl HistoryArgs {
    pub fn new(sheet_id: i64, row_id: i64, column_id: i64, at: Option<String>) -> Self {
        Self {
            sheet_id,
            row_id,
            column_id,
            at,
        }
    }

    pub fn sheet_id(&self) -> i64 {
        self.sheet_id
    }

    pub fn row_id(&self) -> i64 {
        self.row_id
    }

    pub fn column_id(&self) -> i64 {
        self.column_id
    }

    pub fn at(&self) -> Option<&str> {
        self.at.as_deref()
    }
}

fn default_config_path() -> Option<DisplayPath> {
    match dirs::config_dir() {
        Some(dir) => Some(DisplayPath(dir.join("smartsheet-mcp").join("config.json"))),
        None => {
            error!("Unable to determine the config directory, running without a config file");
            None
        }
    }
}

/// A `PathBuf` that implements `Display` and `FromStr` so clap can use it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DisplayPath(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
