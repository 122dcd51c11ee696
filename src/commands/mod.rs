//! Command handlers for the smartsheet-mcp CLI.
//!
//! This module contains implementations for all CLI subcommands. The MCP tools reuse them so that
//! both interfaces report results the same way.

mod backup;
mod history;
mod mcp;

use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use backup::backup;
pub(crate) use backup::run_backup;
pub use history::{history, HistoryReport};
pub use mcp::mcp;

/// What a command produced: a human-readable summary plus, for most commands, the JSON-able value
/// behind it. The CLI logs both, the MCP tools send both as tool content.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    message: String,
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A summary with its structured value.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// A summary only.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Logs the summary at `info` and the structured value at `debug`. Nothing goes to stdout,
    /// which belongs to the MCP transport.
    pub fn print(&self) {
        info!("{}", self.message);
        let Some(structure) = self.structure() else {
            return;
        };
        match serde_json::to_string_pretty(structure) {
            Ok(json) => debug!("Structured output:\n{json}"),
            Err(e) => debug!("Structured output could not be serialized: {e}"),
        }
    }
}
