use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_param, require_teacher, require_workspace, store_err};
use crate::ipc::types::{AppState, Request};
use crate::phases::ALL_SHEETS;
use crate::report::{export_bundle, table_to_csv};
use crate::store::Table;

/// One table as CSV text in the response. Only the known sheets are
/// exportable; this is not a generic sheet reader.
fn handle_table(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let name = match require_param(req, "name") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    if !ALL_SHEETS.contains(&name.as_str()) {
        return err(&req.id, "not_found", format!("no such table: {}", name), None);
    }
    let table = match state.read_table(&name) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    ok(
        &req.id,
        json!({ "name": name, "rows": table.rows.len(), "csv": table_to_csv(&table) }),
    )
}

/// All six tables zipped to a file on disk, for archival after the event.
fn handle_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let path = match require_param(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    let mut tables: Vec<Table> = Vec::with_capacity(ALL_SHEETS.len());
    for name in ALL_SHEETS {
        match state.read_table(name) {
            Ok(t) => tables.push(t),
            Err(e) => return store_err(&req.id, e),
        }
    }

    match export_bundle(&tables, &path) {
        Ok(summary) => ok(
            &req.id,
            json!({ "path": summary.path, "entries": summary.entry_count }),
        ),
        Err(e) => err(&req.id, "io_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.table" => Some(handle_table(state, req)),
        "export.bundle" => Some(handle_bundle(state, req)),
        _ => None,
    }
}
