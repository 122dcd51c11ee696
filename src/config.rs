//! Configuration for smartsheet-mcp.
//!
//! Settings come from three places, in order of precedence: command line flags and their
//! environment variables, the optional config file, and built-in defaults. The config file lives
//! at `<config_dir>/smartsheet-mcp/config.json` unless `--config` says otherwise. The API access
//! token is only ever taken from the command line or the environment.

use crate::api::{RetryPolicy, DEFAULT_ENDPOINT};
use crate::args::Common;
use crate::restore::BackupSettings;
use crate::{utils, Result};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_NAME: &str = "smartsheet-mcp";
const CONFIG_VERSION: u8 = 1;

/// The resolved settings the program runs with.
#[derive(Debug, Clone)]
pub struct Config {
    config_path: Option<PathBuf>,
    api_key: String,
    endpoint: String,
    allow_delete: bool,
    retry: RetryPolicy,
    backup: BackupSettings,
}

impl Config {
    /// Loads the config file named by `common` (a missing file means defaults) and applies the
    /// command line and environment values on top of it.
    pub async fn load(common: &Common) -> Result<Self> {
        let config_path = common.config().map(|p| p.path().to_path_buf());
        let file = match &config_path {
            Some(path) if path.is_file() => ConfigFile::load(path).await?,
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                ConfigFile::default()
            }
            None => ConfigFile::default(),
        };
        Ok(Self::resolve(config_path, file, common))
    }

    fn resolve(config_path: Option<PathBuf>, file: ConfigFile, common: &Common) -> Self {
        let endpoint = common
            .endpoint()
            .map(str::to_string)
            .or(file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let allow_delete = common
            .allow_delete()
            .or(file.allow_delete_tools)
            .unwrap_or(false);
        Self {
            config_path,
            api_key: common.api_key().unwrap_or_default().to_string(),
            endpoint,
            allow_delete,
            retry: file.retry,
            backup: file.backup,
        }
    }

    /// The config file consulted, whether or not it exists.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The API access token. Empty when none was given.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether the MCP tools that delete data are enabled.
    pub fn allow_delete(&self) -> bool {
        self.allow_delete
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn backup(&self) -> BackupSettings {
        self.backup
    }
}

/// Represents the serialization format of the config file. Example:
///
/// ```json
/// {
///   "app_name": "smartsheet-mcp",
///   "config_version": 1,
///   "endpoint": "https://api.smartsheet.eu/2.0",
///   "allow_delete_tools": false,
///   "retry": { "max_retries": 3, "base_delay_ms": 1000, "max_jitter_ms": 1000 },
///   "backup": { "batch_size": 100, "max_concurrent_requests": 5, "batch_delay_ms": 100 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Must be "smartsheet-mcp"
    app_name: String,

    config_version: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    allow_delete_tools: Option<bool>,

    #[serde(default)]
    retry: RetryPolicy,

    #[serde(default)]
    backup: BackupSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            endpoint: None,
            allow_delete_tools: None,
            retry: RetryPolicy::default(),
            backup: BackupSettings::default(),
        }
    }
}

impl ConfigFile {
    /// Loads and validates a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or belongs to another program.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Unable to load the config file at {}", path.display()))?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config file version {} is newer than this program supports ({})",
            config.config_version,
            CONFIG_VERSION
        );

        Ok(config)
    }

    /// Saves the config file, creating its directory if needed.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        if let Some(dir) = p.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Unable to create {}", dir.display()))?;
        }
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    #[cfg(test)]
    pub fn new(endpoint: Option<&str>, allow_delete_tools: Option<bool>) -> Self {
        Self {
            endpoint: endpoint.map(str::to_string),
            allow_delete_tools,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn set_batch_delay_ms(&mut self, batch_delay_ms: u64) {
        self.backup.batch_delay_ms = batch_delay_ms;
    }
}
