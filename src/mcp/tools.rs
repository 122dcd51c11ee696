//! The MCP tools. Most are thin wrappers around one Smartsheet endpoint that hand back its JSON;
//! `create_version_backup` runs the archive workflow.

use crate::api::{Destination, PageQuery, SheetQuery};
use crate::commands::{self, Out};
use crate::mcp::mcp_utils::{backup_tool_result, tool_result};
use crate::mcp::SmartsheetServer;
use crate::model::Sheet;
use crate::restore::BackupRequest;
use crate::Result;
use anyhow::{bail, Context};
use regex::Regex;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;
use rmcp::{tool, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::info;

/// Search scopes for each kind of search tool.
const SHEET_SCOPES: &str = "sheetNames,cellData,summaryFields";
const FOLDER_SCOPES: &str = "folderNames";
const WORKSPACE_SCOPES: &str = "workspaceNames";
const REPORT_SCOPES: &str = "reportNames";
const DASHBOARD_SCOPES: &str = "sightNames";

static SHEET_URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"/sheets/([^?/#]+)").ok());

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SheetIdParams {
    /// The ID of the sheet
    pub sheet_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetSheetParams {
    /// The ID of the sheet to retrieve
    pub sheet_id: String,
    /// Comma-separated list of elements to include (e.g., 'format,discussions')
    pub include: Option<String>,
    /// Comma-separated list of elements to leave out (e.g., 'nonexistentCells')
    pub exclude: Option<String>,
    /// Number of rows per page
    pub page_size: Option<u32>,
    /// Which page of rows to return
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetSheetByUrlParams {
    /// The URL of the sheet, e.g. https://app.smartsheet.com/sheets/<token>
    pub url: String,
    /// Comma-separated list of elements to include (e.g., 'format,discussions')
    pub include: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CellHistoryParams {
    pub sheet_id: String,
    pub row_id: String,
    pub column_id: String,
    /// Extra fields for each entry (e.g., 'columnType,formula,format')
    pub include: Option<String>,
    /// Number of history entries per page
    pub page_size: Option<u32>,
    /// Page to return. Leave out to get every entry.
    pub page: Option<u32>,
}

/// A cell to write. Give a value or a formula, not both.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CellParam {
    /// Column ID
    pub column_id: i64,
    /// Cell value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Cell formula, e.g. '=SUM([Cost]1:[Cost]5)'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Cell format descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowUpdateParam {
    /// Row ID
    pub id: i64,
    pub cells: Vec<CellParam>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRowParam {
    /// Add the row to the top of the sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_top: Option<bool>,
    /// Add the row to the bottom of the sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_bottom: Option<bool>,
    pub cells: Vec<CellParam>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRowsParams {
    pub sheet_id: String,
    /// The rows to update
    pub rows: Vec<RowUpdateParam>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddRowsParams {
    pub sheet_id: String,
    /// The rows to add
    pub rows: Vec<NewRowParam>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsParams {
    pub sheet_id: String,
    /// IDs of the rows to delete
    pub row_ids: Vec<String>,
    /// If true (the default), rows that do not exist are skipped instead of failing the call
    pub ignore_rows_not_found: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CopySheetParams {
    /// The ID of the sheet to copy
    pub sheet_id: String,
    /// Name for the sheet copy
    pub destination_name: String,
    /// ID of the destination folder (same place as the source if not specified)
    pub destination_folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnParam {
    /// Column title
    pub title: String,
    /// Column type, e.g. TEXT_NUMBER, DATE, CHECKBOX, PICKLIST, CONTACT_LIST
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether this is the primary column. A sheet needs exactly one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSheetParams {
    /// Name for the new sheet
    pub name: String,
    pub columns: Vec<ColumnParam>,
    /// ID of the folder to create the sheet in. Leave out to create it in Sheets home.
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SheetDiscussionsParams {
    pub sheet_id: String,
    /// Extra information to include (e.g., 'comments,attachments')
    pub include: Option<String>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
    /// Return every result instead of one page
    pub include_all: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowDiscussionsParams {
    pub sheet_id: String,
    pub row_id: String,
    /// Extra information to include (e.g., 'comments,attachments')
    pub include: Option<String>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
    /// Return every result instead of one page
    pub include_all: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SheetDiscussionParams {
    pub sheet_id: String,
    /// Text of the comment to add
    pub comment_text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowDiscussionParams {
    pub sheet_id: String,
    pub row_id: String,
    /// Text of the comment to add
    pub comment_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Recipient {
    /// Email address of the recipient
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestParams {
    #[serde(skip_serializing)]
    pub sheet_id: String,
    /// Rows to include in the update request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_ids: Option<Vec<i64>>,
    /// Columns to include in the update request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_attachments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_discussions: Option<bool>,
    /// Message to include in the update request email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Subject line for the update request email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Whether to CC the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc_me: Option<bool>,
    /// Who receives the request
    pub send_to: Vec<Recipient>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceIdParams {
    pub workspace_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceParams {
    /// The name of the new workspace
    pub workspace_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceFolderParams {
    /// The ID of the workspace to create the folder in
    pub workspace_id: String,
    /// The name of the new folder
    pub folder_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FolderIdParams {
    pub folder_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderParams {
    /// The ID of the folder to create the folder in
    pub folder_id: String,
    /// The name of the new folder
    pub folder_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserIdParams {
    pub user_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Text to search for
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchInSheetParams {
    pub sheet_id: String,
    /// Text to search for
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchInSheetByUrlParams {
    /// The URL of the sheet
    pub url: String,
    /// Text to search for
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SheetUrlParams {
    /// The URL of the sheet
    pub url: String,
}

/// Parameters for the create_version_backup tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionBackupParams {
    /// The ID of the sheet to reconstruct
    pub sheet_id: String,
    /// The point in time to reconstruct, as an ISO-8601 date-time (e.g. '2025-03-01T12:00:00Z')
    /// or date (midnight UTC)
    pub timestamp: String,
    /// Name of the archive sheet. Defaults to 'Version as of <timestamp>'.
    pub archive_name: Option<String>,
    /// Restore formulas instead of their historical results. Default true.
    #[serde(default = "default_true")]
    pub include_formulas: bool,
    /// Restore conditional formats, links, images and object values. Default true.
    #[serde(default = "default_true")]
    pub include_formatting: bool,
    /// Rows per request when rewriting the archive sheet. Default 100.
    pub batch_size: Option<usize>,
    /// Cell history requests in flight at once. Default 5.
    pub max_concurrent_requests: Option<usize>,
}

fn default_true() -> bool {
    true
}

#[tool_router(vis = "pub(super)")]
impl SmartsheetServer {
    // Sheets ------------------------------------------------------------------------------------

    /// Retrieves the current state of a sheet, including its columns, rows and cells.
    #[tool]
    async fn get_sheet(
        &self,
        Parameters(p): Parameters<GetSheetParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: get_sheet {}", p.sheet_id);
        let query = SheetQuery {
            include: p.include,
            exclude: p.exclude,
            page_size: p.page_size,
            page: p.page,
        };
        let result = self
            .api
            .get_sheet::<Value>(&p.sheet_id, &query)
            .await
            .with_context(|| format!("Failed to get sheet {}", p.sheet_id))
            .map(|sheet| Out::new(format!("Sheet {}", p.sheet_id), sheet));
        tool_result(result)
    }

    /// Retrieves the current state of a sheet from its URL.
    #[tool]
    async fn get_sheet_by_url(
        &self,
        Parameters(p): Parameters<GetSheetByUrlParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: get_sheet_by_url {}", p.url);
        tool_result(self.sheet_by_url(&p.url, p.include).await)
    }

    /// Gets the current version number of a sheet. The version goes up with every change.
    #[tool]
    async fn get_sheet_version(
        &self,
        Parameters(p): Parameters<SheetIdParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .get_sheet_version(&p.sheet_id)
            .await
            .with_context(|| format!("Failed to get the version of sheet {}", p.sheet_id))
            .map(|v| Out::new(format!("Version of sheet {}", p.sheet_id), v));
        tool_result(result)
    }

    /// Gets the history of a cell: every value it has had, newest first, with who changed it
    /// and when.
    #[tool]
    async fn get_cell_history(
        &self,
        Parameters(p): Parameters<CellHistoryParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!(
            "MCP: get_cell_history sheet {} row {} column {}",
            p.sheet_id, p.row_id, p.column_id
        );
        tool_result(self.cell_history(p).await)
    }

    /// Updates cells in existing rows of a sheet.
    #[tool]
    async fn update_rows(
        &self,
        Parameters(p): Parameters<UpdateRowsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: update_rows {} rows in sheet {}", p.rows.len(), p.sheet_id);
        let result = self
            .api
            .update_rows(&p.sheet_id, &p.rows)
            .await
            .with_context(|| format!("Failed to update rows in sheet {}", p.sheet_id))
            .map(|v| Out::new(format!("Updated {} rows", p.rows.len()), v));
        tool_result(result)
    }

    /// Adds new rows to a sheet.
    #[tool]
    async fn add_rows(
        &self,
        Parameters(p): Parameters<AddRowsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: add_rows {} rows to sheet {}", p.rows.len(), p.sheet_id);
        let result = self
            .api
            .add_rows(&p.sheet_id, &p.rows)
            .await
            .with_context(|| format!("Failed to add rows to sheet {}", p.sheet_id))
            .map(|v| Out::new(format!("Added {} rows", p.rows.len()), v));
        tool_result(result)
    }

    /// Deletes rows from a sheet. Only available when the server was started with
    /// ALLOW_DELETE_TOOLS=true.
    #[tool]
    async fn delete_rows(
        &self,
        Parameters(p): Parameters<DeleteRowsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: delete_rows {:?} from sheet {}", p.row_ids, p.sheet_id);
        tool_result(self.delete_rows_checked(p).await)
    }

    /// Gets the folder or workspace a sheet is in.
    #[tool]
    async fn get_sheet_location(
        &self,
        Parameters(p): Parameters<SheetIdParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .get_sheet_location(&p.sheet_id)
            .await
            .with_context(|| format!("Failed to get the location of sheet {}", p.sheet_id))
            .map(|location| Out::new(format!("Location of sheet {}", p.sheet_id), location));
        tool_result(result)
    }

    /// Copies a sheet, with its data, into a folder. Without a destination folder the copy is
    /// placed next to the source.
    #[tool]
    async fn copy_sheet(
        &self,
        Parameters(p): Parameters<CopySheetParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: copy_sheet {} to '{}'", p.sheet_id, p.destination_name);
        tool_result(self.copy_sheet_to(p).await)
    }

    /// Creates a new sheet with the given columns.
    #[tool]
    async fn create_sheet(
        &self,
        Parameters(p): Parameters<CreateSheetParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: create_sheet '{}'", p.name);
        let result = self
            .api
            .create_sheet(&p.name, &p.columns, p.folder_id.as_deref())
            .await
            .with_context(|| format!("Failed to create sheet '{}'", p.name))
            .map(|v| Out::new(format!("Created sheet '{}'", p.name), v));
        tool_result(result)
    }

    // Discussions -------------------------------------------------------------------------------

    /// Lists the discussions on a sheet.
    #[tool]
    async fn get_discussions_by_sheet_id(
        &self,
        Parameters(p): Parameters<SheetDiscussionsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let query = PageQuery {
            include: p.include,
            page_size: p.page_size,
            page: p.page,
            include_all: p.include_all,
        };
        let result = self
            .api
            .get_sheet_discussions(&p.sheet_id, &query)
            .await
            .with_context(|| format!("Failed to get discussions for sheet {}", p.sheet_id))
            .map(|v| Out::new(format!("Discussions on sheet {}", p.sheet_id), v));
        tool_result(result)
    }

    /// Lists the discussions on a row.
    #[tool]
    async fn get_discussions_by_row_id(
        &self,
        Parameters(p): Parameters<RowDiscussionsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let query = PageQuery {
            include: p.include,
            page_size: p.page_size,
            page: p.page,
            include_all: p.include_all,
        };
        let result = self
            .api
            .get_row_discussions(&p.sheet_id, &p.row_id, &query)
            .await
            .with_context(|| format!("Failed to get discussions for row {}", p.row_id))
            .map(|v| Out::new(format!("Discussions on row {}", p.row_id), v));
        tool_result(result)
    }

    /// Starts a discussion on a sheet.
    #[tool]
    async fn create_sheet_discussion(
        &self,
        Parameters(p): Parameters<SheetDiscussionParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .create_sheet_discussion(&p.sheet_id, &p.comment_text)
            .await
            .with_context(|| format!("Failed to create a discussion on sheet {}", p.sheet_id))
            .map(|v| Out::new("Discussion created", v));
        tool_result(result)
    }

    /// Starts a discussion on a row.
    #[tool]
    async fn create_row_discussion(
        &self,
        Parameters(p): Parameters<RowDiscussionParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .create_row_discussion(&p.sheet_id, &p.row_id, &p.comment_text)
            .await
            .with_context(|| format!("Failed to create a discussion on row {}", p.row_id))
            .map(|v| Out::new("Discussion created", v));
        tool_result(result)
    }

    /// Sends an update request, asking the recipients to fill in or update rows by email.
    #[tool]
    async fn create_update_request(
        &self,
        Parameters(p): Parameters<UpdateRequestParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("MCP: create_update_request on sheet {}", p.sheet_id);
        let result = self
            .api
            .create_update_request(&p.sheet_id, &p)
            .await
            .with_context(|| format!("Failed to create an update request on sheet {}", p.sheet_id))
            .map(|v| Out::new(format!("Update request sent to {} recipients", p.send_to.len()), v));
        tool_result(result)
    }

    // Workspaces and folders --------------------------------------------------------------------

    /// Lists the workspaces you can access.
    #[tool]
    async fn get_workspaces(&self) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .list_workspaces()
            .await
            .context("Failed to list workspaces")
            .map(|v| Out::new("Workspaces", v));
        tool_result(result)
    }

    /// Gets a workspace and its contents.
    #[tool]
    async fn get_workspace(
        &self,
        Parameters(p): Parameters<WorkspaceIdParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .get_workspace(&p.workspace_id)
            .await
            .with_context(|| format!("Failed to get workspace {}", p.workspace_id))
            .map(|v| Out::new(format!("Workspace {}", p.workspace_id), v));
        tool_result(result)
    }

    /// Creates a workspace.
    #[tool]
    async fn create_workspace(
        &self,
        Parameters(p): Parameters<CreateWorkspaceParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .create_workspace(&p.workspace_name)
            .await
            .with_context(|| format!("Failed to create workspace '{}'", p.workspace_name))
            .map(|v| Out::new(format!("Created workspace '{}'", p.workspace_name), v));
        tool_result(result)
    }

    /// Creates a folder at the top level of a workspace.
    #[tool]
    async fn create_workspace_folder(
        &self,
        Parameters(p): Parameters<CreateWorkspaceFolderParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .create_workspace_folder(&p.workspace_id, &p.folder_name)
            .await
            .with_context(|| format!("Failed to create folder '{}'", p.folder_name))
            .map(|folder| Out::new(format!("Created folder '{}'", folder.name), folder));
        tool_result(result)
    }

    /// Gets a folder and its contents.
    #[tool]
    async fn get_folder(
        &self,
        Parameters(p): Parameters<FolderIdParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .get_folder(&p.folder_id)
            .await
            .with_context(|| format!("Failed to get folder {}", p.folder_id))
            .map(|v| Out::new(format!("Folder {}", p.folder_id), v));
        tool_result(result)
    }

    /// Creates a folder inside another folder.
    #[tool]
    async fn create_folder(
        &self,
        Parameters(p): Parameters<CreateFolderParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .create_folder(&p.folder_id, &p.folder_name)
            .await
            .with_context(|| format!("Failed to create folder '{}'", p.folder_name))
            .map(|v| Out::new(format!("Created folder '{}'", p.folder_name), v));
        tool_result(result)
    }

    // Users -------------------------------------------------------------------------------------

    /// Gets the user whose access token the server is using.
    #[tool]
    async fn get_current_user(&self) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .get_current_user()
            .await
            .context("Failed to get the current user")
            .map(|v| Out::new("Current user", v));
        tool_result(result)
    }

    /// Gets a user by ID.
    #[tool]
    async fn get_user(
        &self,
        Parameters(p): Parameters<UserIdParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .get_user(&p.user_id)
            .await
            .with_context(|| format!("Failed to get user {}", p.user_id))
            .map(|v| Out::new(format!("User {}", p.user_id), v));
        tool_result(result)
    }

    /// Lists the users in your organization.
    #[tool]
    async fn list_users(&self) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .list_users()
            .await
            .context("Failed to list users")
            .map(|v| Out::new("Users", v));
        tool_result(result)
    }

    // Search ------------------------------------------------------------------------------------

    /// Searches sheet names, cell data and summary fields across everything you can access.
    #[tool]
    async fn search_sheets(
        &self,
        Parameters(p): Parameters<SearchParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tool_result(self.search_scoped(&p.query, SHEET_SCOPES).await)
    }

    /// Searches folder names.
    #[tool]
    async fn search_folders(
        &self,
        Parameters(p): Parameters<SearchParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tool_result(self.search_scoped(&p.query, FOLDER_SCOPES).await)
    }

    /// Searches workspace names.
    #[tool]
    async fn search_workspaces(
        &self,
        Parameters(p): Parameters<SearchParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tool_result(self.search_scoped(&p.query, WORKSPACE_SCOPES).await)
    }

    /// Searches report names.
    #[tool]
    async fn search_reports(
        &self,
        Parameters(p): Parameters<SearchParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tool_result(self.search_scoped(&p.query, REPORT_SCOPES).await)
    }

    /// Searches dashboard names.
    #[tool]
    async fn search_dashboards(
        &self,
        Parameters(p): Parameters<SearchParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tool_result(self.search_scoped(&p.query, DASHBOARD_SCOPES).await)
    }

    /// Searches the contents of one sheet.
    #[tool]
    async fn search_in_sheet(
        &self,
        Parameters(p): Parameters<SearchInSheetParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self
            .api
            .search_sheet(&p.sheet_id, &p.query)
            .await
            .with_context(|| format!("Failed to search sheet {}", p.sheet_id))
            .map(|v| Out::new(format!("Results for '{}' in sheet {}", p.query, p.sheet_id), v));
        tool_result(result)
    }

    /// Searches the contents of one sheet, given its URL.
    #[tool]
    async fn search_in_sheet_by_url(
        &self,
        Parameters(p): Parameters<SearchInSheetByUrlParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tool_result(self.search_sheet_at_url(&p.url, &p.query).await)
    }

    /// Finds the rows of a sheet that mention you, e.g. tasks assigned to you.
    #[tool]
    async fn what_am_i_assigned_to_by_sheet_id(
        &self,
        Parameters(p): Parameters<SheetIdParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tool_result(self.assigned_in(&p.sheet_id).await)
    }

    /// Finds the rows of a sheet that mention you, given the sheet's URL.
    #[tool]
    async fn what_am_i_assigned_to_by_sheet_url(
        &self,
        Parameters(p): Parameters<SheetUrlParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = match self.resolve_sheet_url(&p.url).await {
            Ok(sheet) => self.assigned_in(&sheet.id.to_string()).await,
            Err(e) => Err(e),
        };
        tool_result(result)
    }

    // Archives ----------------------------------------------------------------------------------

    /// Creates an archive copy of a sheet holding the data it had at an earlier point in time.
    ///
    /// The sheet must be in a workspace. The archive is created in a folder named
    /// "Backup of <sheet name>" in that workspace, which is created the first time.
    ///
    /// # How it works
    ///
    /// 1. The sheet is copied with its current data.
    /// 2. The history of every cell that had a value is fetched, a few requests at a time.
    /// 3. Each cell gets the latest value recorded at or before `timestamp`. Cells without such a
    ///    value are left empty, system columns (Created Date and the like) are left alone, and a
    ///    "Duration" column always gets `=[Start Date]@row - [End Date]@row`.
    /// 4. The copy's rows are replaced with the rebuilt rows.
    ///
    /// # Returns
    ///
    /// `{ success: true, message, details }` where details has the archive sheet ID and name and
    /// counts of rows and cells processed, plus any cells whose history could not be fetched. On
    /// failure, `{ success: false, error: { code, message, details } }` with code one of
    /// RESOURCE_NOT_FOUND, PERMISSION_DENIED, RATE_LIMIT_EXCEEDED, INVALID_COLUMN_ID or
    /// ARCHIVE_FAILED.
    ///
    /// # Caution
    ///
    /// The archive only holds rows that had at least one recorded value at `timestamp`. Rows
    /// created after `timestamp`, and rows with no history at or before it, are left out. A large
    /// sheet takes one history request per non-empty cell, which can take a while.
    #[tool]
    async fn create_version_backup(
        &self,
        Parameters(p): Parameters<CreateVersionBackupParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!(
            "MCP: create_version_backup sheet {} at {}",
            p.sheet_id, p.timestamp
        );
        let request = BackupRequest {
            sheet_id: p.sheet_id,
            timestamp: p.timestamp,
            archive_name: p.archive_name,
            include_formulas: p.include_formulas,
            include_formatting: p.include_formatting,
            batch_size: p.batch_size,
            max_concurrent_requests: p.max_concurrent_requests,
        };
        let result = commands::run_backup(&self.api, self.config.backup(), &request).await;
        backup_tool_result(result)
    }
}

impl SmartsheetServer {
    async fn sheet_by_url(&self, url: &str, include: Option<String>) -> Result<Out<Value>> {
        let token = sheet_token(url)?;
        let query = SheetQuery {
            include,
            ..Default::default()
        };
        let sheet: Value = self
            .api
            .get_sheet(&token, &query)
            .await
            .with_context(|| format!("Failed to get sheet at {url}"))?;
        Ok(Out::new(format!("Sheet at {url}"), sheet))
    }

    /// Looks up the sheet a URL points to.
    async fn resolve_sheet_url(&self, url: &str) -> Result<Sheet> {
        let token = sheet_token(url)?;
        let query = SheetQuery {
            exclude: Some("nonexistentCells".to_string()),
            page_size: Some(1),
            ..Default::default()
        };
        self.api
            .get_sheet(&token, &query)
            .await
            .with_context(|| format!("Failed to get sheet at {url}"))
    }

    async fn cell_history(&self, p: CellHistoryParams) -> Result<Out<Value>> {
        let context = || {
            format!(
                "Failed to get the history of row {} column {}",
                p.row_id, p.column_id
            )
        };
        let history = if p.page.is_some() || p.page_size.is_some() {
            let query = PageQuery {
                include: p.include.clone(),
                page_size: p.page_size,
                page: p.page,
                include_all: None,
            };
            self.api
                .get_cell_history_page::<Value>(&p.sheet_id, &p.row_id, &p.column_id, &query)
                .await
                .with_context(context)?
        } else {
            let entries = self
                .api
                .get_cell_history(
                    parse_id(&p.sheet_id, "sheetId")?,
                    parse_id(&p.row_id, "rowId")?,
                    parse_id(&p.column_id, "columnId")?,
                    p.include.as_deref(),
                )
                .await
                .with_context(context)?;
            serde_json::to_value(entries).context("Unable to serialize cell history")?
        };
        Ok(Out::new(
            format!("History of row {} column {}", p.row_id, p.column_id),
            history,
        ))
    }

    async fn delete_rows_checked(&self, p: DeleteRowsParams) -> Result<Out<Value>> {
        if !self.config.allow_delete() {
            bail!("Delete operations are disabled. Set ALLOW_DELETE_TOOLS=true to enable them.");
        }
        let result = self
            .api
            .delete_rows(
                &p.sheet_id,
                &p.row_ids,
                p.ignore_rows_not_found.unwrap_or(true),
            )
            .await
            .with_context(|| format!("Failed to delete rows from sheet {}", p.sheet_id))?;
        Ok(Out::new(format!("Deleted {} rows", p.row_ids.len()), result))
    }

    async fn copy_sheet_to(&self, p: CopySheetParams) -> Result<Out<Value>> {
        let destination = match &p.destination_folder_id {
            Some(folder_id) => Destination::Folder(parse_id(folder_id, "destinationFolderId")?),
            None => {
                let location = self
                    .api
                    .get_sheet_location(&p.sheet_id)
                    .await
                    .with_context(|| format!("Failed to locate sheet {}", p.sheet_id))?;
                match location.workspace_id {
                    Some(id) => Destination::Workspace(id),
                    None => Destination::Home,
                }
            }
        };
        let copy = self
            .api
            .copy_sheet(&p.sheet_id, &p.destination_name, destination, Some("data"))
            .await
            .with_context(|| format!("Failed to copy sheet {}", p.sheet_id))?;
        let message = format!("Copied sheet {} to '{}' ({})", p.sheet_id, copy.name, copy.id);
        let copy = serde_json::to_value(copy).context("Unable to serialize the copy")?;
        Ok(Out::new(message, copy))
    }

    async fn search_scoped(&self, query: &str, scopes: &str) -> Result<Out<Value>> {
        info!("MCP: search '{query}' in {scopes}");
        let results = self
            .api
            .search(query, Some(scopes))
            .await
            .with_context(|| format!("Failed to search for '{query}'"))?;
        Ok(Out::new(format!("Results for '{query}'"), results))
    }

    async fn search_sheet_at_url(&self, url: &str, query: &str) -> Result<Out<Value>> {
        let sheet = self.resolve_sheet_url(url).await?;
        let results = self
            .api
            .search_sheet(sheet.id, query)
            .await
            .with_context(|| format!("Failed to search sheet {}", sheet.id))?;
        Ok(Out::new(
            format!("Results for '{query}' in '{}'", sheet.name),
            results,
        ))
    }

    async fn assigned_in(&self, sheet_id: &str) -> Result<Out<Value>> {
        let user = self
            .api
            .get_current_user()
            .await
            .context("Failed to get the current user")?;
        let Some(email) = user.get("email").and_then(Value::as_str) else {
            bail!("The current user has no email address to search for");
        };
        let results = self
            .api
            .search_sheet(sheet_id, email)
            .await
            .with_context(|| format!("Failed to search for assigned tasks in sheet {sheet_id}"))?;
        Ok(Out::new(
            format!("Rows in sheet {sheet_id} mentioning {email}"),
            results,
        ))
    }
}

/// The direct-id token of a sheet URL such as `https://app.smartsheet.com/sheets/<token>?view=grid`.
fn sheet_token(url: &str) -> Result<String> {
    let re = SHEET_URL.as_ref().context("Bad sheet URL pattern")?;
    match re.captures(url) {
        Some(captures) => Ok(captures[1].to_string()),
        None => bail!("Invalid sheet URL '{url}', expected .../sheets/<id>"),
    }
}

fn parse_id(id: &str, name: &str) -> Result<i64> {
    id.trim()
        .parse()
        .with_context(|| format!("{name} must be a number, got '{id}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sheet_token() {
        assert_eq!(
            sheet_token("https://app.smartsheet.com/sheets/Qx7c9?view=grid").unwrap(),
            "Qx7c9"
        );
        assert_eq!(
            sheet_token("https://app.smartsheet.com/sheets/123/").unwrap(),
            "123"
        );
        assert!(sheet_token("https://app.smartsheet.com/folders/1").is_err());
    }

    #[test]
    fn test_update_request_body_leaves_out_sheet_id() {
        let params: UpdateRequestParams = serde_json::from_value(json!({
            "sheetId": "7",
            "rowIds": [1, 2],
            "sendTo": [{"email": "ada@example.com"}],
            "ccMe": true
        }))
        .unwrap();
        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(
            body,
            json!({"rowIds": [1, 2], "sendTo": [{"email": "ada@example.com"}], "ccMe": true})
        );
    }

    #[test]
    fn test_backup_params_default_flags() {
        let params: CreateVersionBackupParams =
            serde_json::from_value(json!({"sheetId": "1", "timestamp": "2025-01-01"})).unwrap();
        assert!(params.include_formulas);
        assert!(params.include_formatting);
        assert_eq!(params.batch_size, None);
    }

    #[test]
    fn test_cell_param_serializes_only_given_fields() {
        let cell: CellParam = serde_json::from_value(json!({"columnId": 5, "formula": "=1"})).unwrap();
        assert_eq!(
            serde_json::to_value(&cell).unwrap(),
            json!({"columnId": 5, "formula": "=1"})
        );
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(" 42 ", "sheetId").unwrap(), 42);
        let err = parse_id("abc", "rowId").unwrap_err();
        assert!(err.to_string().contains("rowId must be a number"));
    }
}
