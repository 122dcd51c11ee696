//! The typed surface over a `Transport`: one method per Smartsheet endpoint this crate uses.

use crate::api::Transport;
use crate::model::{CellHistoryEntry, Folder, Page, ResultEnvelope, SheetLocation, SheetSummary};
use crate::Result;
use anyhow::Context;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, trace};

/// The page size used when walking every page of a cell's history.
const HISTORY_PAGE_SIZE: u32 = 100;

/// Query options for `GET /sheets/{id}`.
#[derive(Debug, Clone, Default)]
pub struct SheetQuery {
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
}

impl SheetQuery {
    pub fn include(include: impl Into<String>) -> Self {
        Self {
            include: Some(include.into()),
            ..Default::default()
        }
    }
}

/// Paging options shared by the list endpoints (discussions, cell history).
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub include: Option<String>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
    pub include_all: Option<bool>,
}

/// Where `copy_sheet` puts the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Home,
    Folder(i64),
    Workspace(i64),
}

impl Destination {
    fn body(&self, new_name: &str) -> Value {
        match self {
            Destination::Home => json!({"newName": new_name, "destinationType": "home"}),
            Destination::Folder(id) => {
                json!({"newName": new_name, "destinationType": "folder", "destinationId": id})
            }
            Destination::Workspace(id) => {
                json!({"newName": new_name, "destinationType": "workspace", "destinationId": id})
            }
        }
    }
}

/// Typed access to the Smartsheet API. Cheap to clone, all clones share one `Transport`.
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
}

impl Api {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, Option<String>)],
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.transport.request(method, path, body, query).await?;
        serde_json::from_value(value)
            .with_context(|| format!("Unexpected response shape from {path}"))
    }

    // Sheets ------------------------------------------------------------------------------------

    /// `GET /sheets/{id}`. Use `T = Sheet` for the typed view or `T = Value` to pass it through.
    pub async fn get_sheet<T>(&self, sheet_id: impl Display, query: &SheetQuery) -> Result<T>
    where
        T: DeserializeOwned,
    {
        trace!("get_sheet {sheet_id}");
        self.call(
            Method::GET,
            &format!("/sheets/{sheet_id}"),
            None,
            &[
                ("include", query.include.clone()),
                ("exclude", query.exclude.clone()),
                ("pageSize", query.page_size.map(|v| v.to_string())),
                ("page", query.page.map(|v| v.to_string())),
            ],
        )
        .await
    }

    pub async fn get_sheet_version(&self, sheet_id: impl Display) -> Result<Value> {
        self.call(Method::GET, &format!("/sheets/{sheet_id}/version"), None, &[])
            .await
    }

    /// One page of a cell's revision history.
    pub async fn get_cell_history_page<T>(
        &self,
        sheet_id: impl Display,
        row_id: impl Display,
        column_id: impl Display,
        query: &PageQuery,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.call(
            Method::GET,
            &format!("/sheets/{sheet_id}/rows/{row_id}/columns/{column_id}/history"),
            None,
            &[
                ("include", query.include.clone()),
                ("pageSize", query.page_size.map(|v| v.to_string())),
                ("page", query.page.map(|v| v.to_string())),
            ],
        )
        .await
    }

    /// Every revision of a cell, walking all pages of the history endpoint.
    pub async fn get_cell_history(
        &self,
        sheet_id: i64,
        row_id: i64,
        column_id: i64,
        include: Option<&str>,
    ) -> Result<Vec<CellHistoryEntry>> {
        let mut entries = Vec::new();
        let mut page_number = 1;
        loop {
            let query = PageQuery {
                include: include.map(str::to_string),
                page_size: Some(HISTORY_PAGE_SIZE),
                page: Some(page_number),
                include_all: None,
            };
            let page: Page<CellHistoryEntry> = self
                .get_cell_history_page(sheet_id, row_id, column_id, &query)
                .await?;
            let received = page.data.len();
            entries.extend(page.data);
            let total_pages = page.total_pages.unwrap_or(1);
            if received == 0 || page_number >= total_pages {
                break;
            }
            page_number += 1;
        }
        debug!(
            "Cell {row_id}/{column_id} of sheet {sheet_id} has {} history entries",
            entries.len()
        );
        Ok(entries)
    }

    /// `PUT /sheets/{id}/rows`.
    pub async fn update_rows<B>(&self, sheet_id: impl Display, rows: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(rows).context("Unable to serialize rows")?;
        self.call(Method::PUT, &format!("/sheets/{sheet_id}/rows"), Some(body), &[])
            .await
    }

    /// `POST /sheets/{id}/rows`.
    pub async fn add_rows<B>(&self, sheet_id: impl Display, rows: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(rows).context("Unable to serialize rows")?;
        self.call(Method::POST, &format!("/sheets/{sheet_id}/rows"), Some(body), &[])
            .await
    }

    /// `DELETE /sheets/{id}/rows?ids=a,b,c`.
    pub async fn delete_rows<I>(
        &self,
        sheet_id: impl Display,
        row_ids: &[I],
        ignore_rows_not_found: bool,
    ) -> Result<Value>
    where
        I: Display,
    {
        let ids = row_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.call(
            Method::DELETE,
            &format!("/sheets/{sheet_id}/rows"),
            None,
            &[
                ("ids", Some(ids)),
                ("ignoreRowsNotFound", Some(ignore_rows_not_found.to_string())),
            ],
        )
        .await
    }

    /// The enclosing workspace of a sheet, derived from the sheet itself.
    pub async fn get_sheet_location(&self, sheet_id: impl Display) -> Result<SheetLocation> {
        let sheet: crate::model::Sheet = self.get_sheet(sheet_id, &SheetQuery::default()).await?;
        let workspace_id = sheet.workspace.map(|w| w.id);
        Ok(SheetLocation {
            folder_id: workspace_id,
            folder_type: "workspace".to_string(),
            workspace_id,
        })
    }

    /// `POST /sheets/{id}/copy`. `include` names the elements copied along with the structure,
    /// e.g. `data` for rows and cell values.
    pub async fn copy_sheet(
        &self,
        sheet_id: impl Display,
        new_name: &str,
        destination: Destination,
        include: Option<&str>,
    ) -> Result<SheetSummary> {
        let envelope: ResultEnvelope<SheetSummary> = self
            .call(
                Method::POST,
                &format!("/sheets/{sheet_id}/copy"),
                Some(destination.body(new_name)),
                &[("include", include.map(str::to_string))],
            )
            .await?;
        Ok(envelope.result)
    }

    /// Creates a sheet in the user's home, or inside `folder_id` when given.
    pub async fn create_sheet<C>(
        &self,
        name: &str,
        columns: &C,
        folder_id: Option<&str>,
    ) -> Result<Value>
    where
        C: Serialize + ?Sized,
    {
        let path = match folder_id {
            Some(folder_id) => format!("/folders/{folder_id}/sheets"),
            None => "/sheets".to_string(),
        };
        let body = json!({"name": name, "columns": columns});
        self.call(Method::POST, &path, Some(body), &[]).await
    }

    // Discussions -------------------------------------------------------------------------------

    pub async fn get_sheet_discussions(
        &self,
        sheet_id: impl Display,
        query: &PageQuery,
    ) -> Result<Value> {
        self.call(
            Method::GET,
            &format!("/sheets/{sheet_id}/discussions"),
            None,
            &page_params(query),
        )
        .await
    }

    pub async fn get_row_discussions(
        &self,
        sheet_id: impl Display,
        row_id: impl Display,
        query: &PageQuery,
    ) -> Result<Value> {
        self.call(
            Method::GET,
            &format!("/sheets/{sheet_id}/rows/{row_id}/discussions"),
            None,
            &page_params(query),
        )
        .await
    }

    pub async fn create_sheet_discussion(
        &self,
        sheet_id: impl Display,
        comment_text: &str,
    ) -> Result<Value> {
        self.call(
            Method::POST,
            &format!("/sheets/{sheet_id}/discussions"),
            Some(json!({"comment": {"text": comment_text}})),
            &[],
        )
        .await
    }

    pub async fn create_row_discussion(
        &self,
        sheet_id: impl Display,
        row_id: impl Display,
        comment_text: &str,
    ) -> Result<Value> {
        self.call(
            Method::POST,
            &format!("/sheets/{sheet_id}/rows/{row_id}/discussions"),
            Some(json!({"comment": {"text": comment_text}})),
            &[],
        )
        .await
    }

    /// `POST /sheets/{id}/updaterequests`.
    pub async fn create_update_request<B>(&self, sheet_id: impl Display, request: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(request).context("Unable to serialize update request")?;
        self.call(
            Method::POST,
            &format!("/sheets/{sheet_id}/updaterequests"),
            Some(body),
            &[],
        )
        .await
    }

    // Workspaces and folders --------------------------------------------------------------------

    pub async fn list_workspaces(&self) -> Result<Value> {
        self.call(Method::GET, "/workspaces", None, &[]).await
    }

    pub async fn get_workspace(&self, workspace_id: impl Display) -> Result<Value> {
        self.call(Method::GET, &format!("/workspaces/{workspace_id}"), None, &[])
            .await
    }

    pub async fn create_workspace(&self, name: &str) -> Result<Value> {
        self.call(Method::POST, "/workspaces", Some(json!({"name": name})), &[])
            .await
    }

    /// Every top-level folder of a workspace.
    pub async fn list_workspace_folders(&self, workspace_id: impl Display) -> Result<Vec<Folder>> {
        let page: Page<Folder> = self
            .call(
                Method::GET,
                &format!("/workspaces/{workspace_id}/folders"),
                None,
                &[("includeAll", Some("true".to_string()))],
            )
            .await?;
        Ok(page.data)
    }

    pub async fn create_workspace_folder(
        &self,
        workspace_id: impl Display,
        name: &str,
    ) -> Result<Folder> {
        let envelope: ResultEnvelope<Folder> = self
            .call(
                Method::POST,
                &format!("/workspaces/{workspace_id}/folders"),
                Some(json!({"name": name})),
                &[],
            )
            .await?;
        Ok(envelope.result)
    }

    pub async fn get_folder(&self, folder_id: impl Display) -> Result<Value> {
        self.call(Method::GET, &format!("/folders/{folder_id}"), None, &[])
            .await
    }

    pub async fn create_folder(&self, parent_folder_id: impl Display, name: &str) -> Result<Value> {
        self.call(
            Method::POST,
            &format!("/folders/{parent_folder_id}/folders"),
            Some(json!({"name": name})),
            &[],
        )
        .await
    }

    // Users -------------------------------------------------------------------------------------

    pub async fn get_current_user(&self) -> Result<Value> {
        self.call(Method::GET, "/users/me", None, &[]).await
    }

    pub async fn get_user(&self, user_id: impl Display) -> Result<Value> {
        self.call(Method::GET, &format!("/users/{user_id}"), None, &[])
            .await
    }

    pub async fn list_users(&self) -> Result<Value> {
        self.call(Method::GET, "/users", None, &[]).await
    }

    // Search ------------------------------------------------------------------------------------

    /// `GET /search`, restricted to the comma-separated `scopes` when given.
    pub async fn search(&self, query: &str, scopes: Option<&str>) -> Result<Value> {
        self.call(
            Method::GET,
            "/search",
            None,
            &[
                ("query", Some(query.to_string())),
                ("scopes", scopes.map(str::to_string)),
            ],
        )
        .await
    }

    /// `GET /search/sheets/{id}`.
    pub async fn search_sheet(&self, sheet_id: impl Display, query: &str) -> Result<Value> {
        self.call(
            Method::GET,
            &format!("/search/sheets/{sheet_id}"),
            None,
            &[("query", Some(query.to_string()))],
        )
        .await
    }
}

fn page_params(query: &PageQuery) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("include", query.include.clone()),
        ("pageSize", query.page_size.map(|v| v.to_string())),
        ("page", query.page.map(|v| v.to_string())),
        ("includeAll", query.include_all.map(|v| v.to_string())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_client::TestTransport;
    use crate::model::Sheet;
    use crate::test::{history_entry, sample_sheet};

    fn api(transport: &Arc<TestTransport>) -> Api {
        Api::new(transport.clone())
    }

    #[tokio::test]
    async fn test_get_sheet_typed_and_raw() {
        let transport = Arc::new(TestTransport::new());
        transport.add_sheet(sample_sheet(1, Some(10)));
        let api = api(&transport);

        let sheet: Sheet = api.get_sheet(1, &SheetQuery::default()).await.unwrap();
        assert_eq!(sheet.name, "Plan");
        let raw: Value = api.get_sheet("1", &SheetQuery::include("format")).await.unwrap();
        assert_eq!(raw["id"], 1);

        let calls = transport.calls();
        assert_eq!(calls[1].query_value("include"), Some("format"));
    }

    #[tokio::test]
    async fn test_get_cell_history_walks_pages() {
        let transport = Arc::new(TestTransport::new());
        transport.add_sheet(sample_sheet(1, Some(10)));
        transport.set_history_page_size(2);
        transport.set_history(
            101,
            1,
            vec![
                history_entry("2025-01-03T00:00:00Z", "c"),
                history_entry("2025-01-02T00:00:00Z", "b"),
                history_entry("2025-01-01T00:00:00Z", "a"),
            ],
        );
        let entries = api(&transport)
            .get_cell_history(1, 101, 1, Some("columnType,formula"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].value, Some(json!("a")));

        let history_calls: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|c| c.path.ends_with("/history"))
            .collect();
        assert_eq!(history_calls.len(), 2);
        assert_eq!(history_calls[1].query_value("page"), Some("2"));
        assert_eq!(history_calls[0].query_value("include"), Some("columnType,formula"));
    }

    #[tokio::test]
    async fn test_delete_rows_joins_ids() {
        let transport = Arc::new(TestTransport::new());
        transport.add_sheet(sample_sheet(1, Some(10)));
        api(&transport).delete_rows(1, &[101, 102], true).await.unwrap();
        let call = transport.calls().pop().unwrap();
        assert_eq!(call.method, Method::DELETE);
        assert_eq!(call.query_value("ids"), Some("101,102"));
        assert_eq!(call.query_value("ignoreRowsNotFound"), Some("true"));
    }

    #[tokio::test]
    async fn test_copy_sheet_body() {
        let transport = Arc::new(TestTransport::new());
        transport.add_sheet(sample_sheet(1, Some(10)));
        let copy = api(&transport)
            .copy_sheet(1, "Copy", Destination::Folder(77), Some("data"))
            .await
            .unwrap();
        assert_ne!(copy.id, 1);
        assert_eq!(copy.name, "Copy");
        let call = transport.calls().pop().unwrap();
        assert_eq!(
            call.body,
            Some(json!({"newName": "Copy", "destinationType": "folder", "destinationId": 77}))
        );
    }

    #[tokio::test]
    async fn test_sheet_location_without_workspace() {
        let transport = Arc::new(TestTransport::new());
        transport.add_sheet(sample_sheet(1, None));
        let location = api(&transport).get_sheet_location(1).await.unwrap();
        assert_eq!(location.workspace_id, None);
        assert_eq!(location.folder_type, "workspace");
    }

    #[tokio::test]
    async fn test_create_sheet_in_folder() {
        let transport = Arc::new(TestTransport::new());
        let columns = json!([{"title": "Name", "type": "TEXT_NUMBER", "primary": true}]);
        let created = api(&transport)
            .create_sheet("New", &columns, Some("55"))
            .await
            .unwrap();
        let call = transport.calls().pop().unwrap();
        assert_eq!(call.path, "/folders/55/sheets");
        assert_eq!(call.body.unwrap()["name"], "New");
        let id = created["result"]["id"].as_i64().unwrap();
        assert_eq!(transport.sheet(id).unwrap().name, "New");
    }

    #[test]
    fn test_destination_bodies() {
        assert_eq!(
            Destination::Home.body("x"),
            json!({"newName": "x", "destinationType": "home"})
        );
        assert_eq!(
            Destination::Workspace(3).body("x")["destinationType"],
            "workspace"
        );
    }
}
