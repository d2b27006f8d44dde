use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_param, require_teacher, require_workspace, store_err};
use crate::ipc::types::{AppState, Request};
use crate::phases;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match require_param(req, "path") {
        Ok(p) => PathBuf::from(p),
        Err(resp) => return resp,
    };
    match state.select_workspace(path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "io_failed", format!("{e:?}"), None),
    }
}

/// First-run bootstrap: create any missing sheet and seed the competency
/// catalog. Safe to call repeatedly.
fn handle_sheets_init(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let catalog = crate::catalog::Catalog::default_catalog();
    let created = match state.with_store(|store| phases::ensure_sheets(store, &catalog)) {
        Ok(created) => created,
        Err(e) => return store_err(&req.id, e),
    };
    for name in &created {
        state.cache.invalidate(name);
    }
    ok(&req.id, json!({ "created": created }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "sheets.init" => Some(handle_sheets_init(state, req)),
        _ => None,
    }
}
