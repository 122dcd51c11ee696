//! A Model Context Protocol server for Smartsheet, plus a workflow that rebuilds a sheet as it
//! was at an earlier time into an archive copy.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
mod mcp;
pub mod model;
pub mod restore;
mod utils;


pub use config::{Config, ConfigFile};
pub use error::Error;
pub use error::Result;
