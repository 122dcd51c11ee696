//! Implements the `Transport` trait with an in-memory imitation of the Smartsheet service so that
//! the API wrapper, the reconstruction workflow and the MCP tools can be tested without a network.

use crate::api::error::ApiError;
use crate::api::Transport;
use crate::model::{Cell, CellHistoryEntry, Folder, Row, Sheet};
use crate::Result;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<Value>,
    pub(crate) query: Vec<(String, String)>,
}

impl Call {
    pub(crate) fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct State {
    next_id: i64,
    sheets: HashMap<i64, Sheet>,
    history: HashMap<(i64, i64), Vec<CellHistoryEntry>>,
    history_page_size: Option<usize>,
    folders: HashMap<i64, Vec<Folder>>,
    canned: HashMap<(Method, String), Value>,
    failures: HashMap<(Method, String), (StatusCode, Value)>,
    added_rows: HashMap<i64, Vec<Value>>,
    calls: Vec<Call>,
}

/// An in-memory Smartsheet. Sheets, cell histories and workspace folders are seeded by the test;
/// copies, sheet creation, row deletes, row adds and folder creation mutate the state the way the service would.
/// Any route can be forced to fail with `fail`, and any other route can be answered with `respond`.
/// Unknown routes answer `404`.
pub(crate) struct TestTransport {
    state: Mutex<State>,
}

impl TestTransport {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 9_000_000,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn add_sheet(&self, sheet: Sheet) {
        self.state().sheets.insert(sheet.id, sheet);
    }

    pub(crate) fn sheet(&self, sheet_id: i64) -> Option<Sheet> {
        self.state().sheets.get(&sheet_id).cloned()
    }

    /// Sets the history of the cell at (`row_id`, `column_id`), newest first like the service.
    pub(crate) fn set_history(&self, row_id: i64, column_id: i64, entries: Vec<CellHistoryEntry>) {
        self.state().history.insert((row_id, column_id), entries);
    }

    /// Forces the history endpoint to page its results, ignoring the requested page size.
    pub(crate) fn set_history_page_size(&self, size: usize) {
        self.state().history_page_size = Some(size);
    }

    pub(crate) fn add_folder(&self, workspace_id: i64, folder: Folder) {
        self.state()
            .folders
            .entry(workspace_id)
            .or_default()
            .push(folder);
    }

    pub(crate) fn folders(&self, workspace_id: i64) -> Vec<Folder> {
        self.state()
            .folders
            .get(&workspace_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Answers `method path` with `body`.
    pub(crate) fn respond(&self, method: Method, path: &str, body: Value) {
        self.state().canned.insert((method, path.to_string()), body);
    }

    /// Makes `method path` fail with `status` and the service's JSON error `body`.
    pub(crate) fn fail(&self, method: Method, path: &str, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).unwrap();
        self.state()
            .failures
            .insert((method, path.to_string()), (status, body));
    }

    /// The raw JSON rows posted to `POST /sheets/{sheet_id}/rows`, in order.
    pub(crate) fn added_rows(&self, sheet_id: i64) -> Vec<Value> {
        self.state()
            .added_rows
            .get(&sheet_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub(crate) fn count_calls(&self, method: Method, path_suffix: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path.ends_with(path_suffix))
            .count()
    }
}

#[async_trait::async_trait]
impl Transport for TestTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, Option<String>)],
    ) -> Result<Value> {
        let query: Vec<(String, String)> = query
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
            .collect();
        let mut state = self.state();
        state.calls.push(Call {
            method: method.clone(),
            path: path.to_string(),
            body: body.clone(),
            query: query.clone(),
        });

        let key = (method.clone(), path.to_string());
        if let Some((status, error)) = state.failures.get(&key) {
            return Err(ApiError::from_response(*status, None, &error.to_string()).into());
        }
        if let Some(canned) = state.canned.get(&key) {
            return Ok(canned.clone());
        }

        let q = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let routed = match (method.as_str(), segments.as_slice()) {
            ("GET", ["sheets", id]) => {
                let id = parse_id(id)?;
                state
                    .sheets
                    .get(&id)
                    .map(|s| serde_json::to_value(s).unwrap())
            }
            ("GET", ["sheets", id, "version"]) => {
                let id = parse_id(id)?;
                state.sheets.get(&id).map(|_| json!({"version": 1}))
            }
            ("GET", ["sheets", _, "rows", row, "columns", column, "history"]) => {
                let key = (parse_id(row)?, parse_id(column)?);
                let entries = state.history.get(&key).cloned().unwrap_or_default();
                let page_size = state
                    .history_page_size
                    .or_else(|| q("pageSize").and_then(|v| v.parse().ok()))
                    .unwrap_or(100)
                    .max(1);
                let page: usize = q("page").and_then(|v| v.parse().ok()).unwrap_or(1).max(1);
                let total_pages = entries.len().div_ceil(page_size).max(1);
                let data: Vec<_> = entries
                    .into_iter()
                    .skip((page - 1) * page_size)
                    .take(page_size)
                    .collect();
                Some(json!({
                    "pageNumber": page,
                    "pageSize": page_size,
                    "totalPages": total_pages,
                    "data": data,
                }))
            }
            ("POST", ["sheets", id, "copy"]) => {
                let id = parse_id(id)?;
                let body = body.unwrap_or_default();
                let with_data = q("include").is_some_and(|v| v.split(',').any(|i| i == "data"));
                match state.sheets.get(&id).cloned() {
                    None => None,
                    Some(source) => {
                        let copy = copy_sheet(&mut state, &source, &body, with_data);
                        let result = json!({"id": copy.id, "name": copy.name});
                        state.sheets.insert(copy.id, copy);
                        Some(json!({"message": "SUCCESS", "resultCode": 0, "result": result}))
                    }
                }
            }
            ("DELETE", ["sheets", id, "rows"]) => {
                let id = parse_id(id)?;
                let ids: Vec<i64> = q("ids")
                    .unwrap_or_default()
                    .split(',')
                    .filter_map(|v| v.parse().ok())
                    .collect();
                match state.sheets.get_mut(&id) {
                    None => None,
                    Some(sheet) => {
                        sheet.rows.retain(|r| !ids.contains(&r.id));
                        renumber(sheet);
                        Some(json!({"message": "SUCCESS", "resultCode": 0, "result": ids}))
                    }
                }
            }
            ("POST", ["sheets", id, "rows"]) => {
                let id = parse_id(id)?;
                let rows = match body {
                    Some(Value::Array(rows)) => rows,
                    Some(row) => vec![row],
                    None => vec![],
                };
                if !state.sheets.contains_key(&id) {
                    None
                } else {
                    let mut created = Vec::new();
                    for raw in &rows {
                        let row_id = next_id(&mut state);
                        let cells: Vec<Cell> =
                            serde_json::from_value(raw["cells"].clone()).unwrap_or_default();
                        created.push(Row {
                            id: row_id,
                            cells,
                            ..Default::default()
                        });
                    }
                    state
                        .added_rows
                        .entry(id)
                        .or_default()
                        .extend(rows.iter().cloned());
                    let result: Vec<Value> =
                        created.iter().map(|r| json!({"id": r.id})).collect();
                    if let Some(sheet) = state.sheets.get_mut(&id) {
                        sheet.rows.extend(created);
                        renumber(sheet);
                    }
                    Some(json!({"message": "SUCCESS", "resultCode": 0, "result": result}))
                }
            }
            ("PUT", ["sheets", _, "rows"]) => {
                Some(json!({"message": "SUCCESS", "resultCode": 0, "result": body}))
            }
            ("POST", ["sheets"]) | ("POST", ["folders", _, "sheets"]) => {
                let id = next_id(&mut state);
                let name = body
                    .as_ref()
                    .and_then(|b| b["name"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let sheet = Sheet {
                    id,
                    name: name.clone(),
                    ..Default::default()
                };
                state.sheets.insert(id, sheet);
                Some(json!({"message": "SUCCESS", "resultCode": 0, "result": {"id": id, "name": name}}))
            }
            ("GET", ["workspaces", id, "folders"]) => {
                let id = parse_id(id)?;
                let data = state.folders.get(&id).cloned().unwrap_or_default();
                Some(json!({"pageNumber": 1, "totalPages": 1, "totalCount": data.len(), "data": data}))
            }
            ("POST", ["workspaces", id, "folders"]) => {
                let id = parse_id(id)?;
                let name = body
                    .as_ref()
                    .and_then(|b| b["name"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let folder = Folder {
                    id: next_id(&mut state),
                    name,
                    permalink: None,
                };
                state.folders.entry(id).or_default().push(folder.clone());
                Some(json!({"message": "SUCCESS", "resultCode": 0, "result": folder}))
            }
            _ => None,
        };

        routed.ok_or_else(|| {
            ApiError::from_response(
                StatusCode::NOT_FOUND,
                None,
                &json!({"errorCode": 1006, "message": "Not Found"}).to_string(),
            )
            .into()
        })
    }
}

fn parse_id(segment: &str) -> Result<i64> {
    segment.parse().map_err(|_| {
        ApiError::from_response(
            StatusCode::BAD_REQUEST,
            None,
            &json!({"errorCode": 1008, "message": format!("Invalid id '{segment}'")}).to_string(),
        )
        .into()
    })
}

fn next_id(state: &mut State) -> i64 {
    state.next_id += 1;
    state.next_id
}

fn renumber(sheet: &mut Sheet) {
    for (i, row) in sheet.rows.iter_mut().enumerate() {
        row.row_number = Some(i as u32 + 1);
    }
}

/// Copies `source` the way the service does: new sheet, column and row ids, same titles, order and
/// row numbers. Rows and cell values come along only when `with_data` is set.
fn copy_sheet(state: &mut State, source: &Sheet, body: &Value, with_data: bool) -> Sheet {
    let id = next_id(state);
    let mut column_ids = HashMap::new();
    let mut columns = Vec::new();
    for column in &source.columns {
        let new_id = next_id(state);
        column_ids.insert(column.id, new_id);
        let mut column = column.clone();
        column.id = new_id;
        columns.push(column);
    }

    let mut rows = Vec::new();
    if with_data {
        for row in &source.rows {
            let mut row = row.clone();
            row.id = next_id(state);
            for cell in &mut row.cells {
                cell.column_id = cell.column_id.and_then(|c| column_ids.get(&c).copied());
            }
            rows.push(row);
        }
    }

    Sheet {
        id,
        name: body["newName"].as_str().unwrap_or_default().to_string(),
        columns,
        rows,
        workspace: source.workspace.clone(),
        permalink: None,
    }
}
