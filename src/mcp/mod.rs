//! MCP (Model Context Protocol) server implementation.
//!
//! This module provides an MCP server that exposes Smartsheet operations and the point-in-time
//! archive workflow as tools for AI agent integration. The server communicates via JSON-RPC over
//! stdio.

mod mcp_utils;
mod tools;

use crate::api::Api;
use crate::Config;
use anyhow::anyhow;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::transport::stdio;
use rmcp::{tool_handler, ServerHandler, ServiceExt};
use std::sync::Arc;
use tracing::info;

/// The smartsheet MCP server.
#[derive(Clone)]
pub struct SmartsheetServer {
    config: Arc<Config>,
    api: Api,
    tool_router: ToolRouter<SmartsheetServer>,
}

impl SmartsheetServer {
    /// Creates a new server that uses `api` for every remote call.
    pub fn new(config: Config, api: Api) -> Self {
        Self {
            config: Arc::new(config),
            api,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_handler]
impl ServerHandler for SmartsheetServer {
    /// Returns server information sent to the MCP client during initialization.
    ///
    /// The `instructions` are shown to the agent to help it understand when and how to use this
    /// server's tools.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "smartsheet".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(include_str!("docs/INSTRUCTIONS.md").into()),
        }
    }
}

/// Transport type for the MCP server.
#[derive(Debug, Default)]
pub(crate) enum Io {
    #[default]
    Stdio,
    /// Mock transport for testing - holds one end of a duplex channel.
    #[cfg(test)]
    Mock(tokio::io::DuplexStream),
}

/// Runs the MCP server with stdio transport or mock transport. This function starts the MCP server
/// and blocks until the client disconnects or an error occurs.
///
/// # Arguments
/// - `config`: The `Config` object
/// - `api`: The Smartsheet API the tools call
/// - `io`: Whether we are using stdio as the transport or using mock io for testing
///
pub(crate) async fn run_server(config: Config, api: Api, io: Io) -> crate::Result<()> {
    if config.allow_delete() {
        info!("Delete tools are enabled");
    } else {
        info!("Delete tools are disabled, set ALLOW_DELETE_TOOLS=true to enable them");
    }
    let server = SmartsheetServer::new(config, api);
    info!("Starting MCP server...");

    let service = match io {
        Io::Stdio => server
            .serve(stdio())
            .await
            .map_err(|e| anyhow!("Failed to start MCP server: {e}"))?,
        #[cfg(test)]
        Io::Mock(stream) => server
            .serve(stream)
            .await
            .map_err(|e| anyhow!("Failed to start MCP server: {e}"))?,
    };

    info!("MCP server running, waiting for requests...");

    // Wait for the server to complete (client disconnects or error)
    service
        .waiting()
        .await
        .map_err(|e| anyhow!("MCP server error: {e}"))?;

    info!("MCP server shut down");
    Ok(())
}
