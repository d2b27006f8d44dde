use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_catalog, param_str, require_param, require_session, require_teacher, require_workspace,
    store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::phases::SHEET_COMPETENCIES;

/// Catalog snapshot grouped by category, for populating pickers.
fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_session(state, req) {
        return resp;
    }
    let catalog = match load_catalog(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let groups: Vec<serde_json::Value> = catalog
        .group_by_category()
        .into_iter()
        .map(|group| {
            let items: Vec<serde_json::Value> = group
                .items
                .iter()
                .map(|(code, description)| {
                    json!({
                        "code": code,
                        "description": description,
                        "kind": catalog.kind(code),
                    })
                })
                .collect();
            json!({ "key": group.key, "label": group.label, "competencies": items })
        })
        .collect();
    ok(&req.id, json!({ "categories": groups }))
}

/// Add a catalog entry. The code's category prefix decides how it is
/// classified, so an unknown prefix is rejected up front rather than
/// silently landing in no category.
fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let code = match require_param(req, "code") {
        Ok(v) => v.trim().to_uppercase(),
        Err(resp) => return resp,
    };
    let description = param_str(req, "description").unwrap_or("").trim().to_string();

    let catalog = match load_catalog(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if catalog.contains(&code) {
        return err(
            &req.id,
            "validation_failed",
            format!("competency already exists: {}", code),
            None,
        );
    }
    let Some(category) = catalog.classify(&code) else {
        return err(
            &req.id,
            "validation_failed",
            format!("code does not match any category prefix: {}", code),
            None,
        );
    };
    let category = category.to_string();

    let row = vec![code.clone(), category.clone(), description];
    if let Err(e) = state.append(SHEET_COMPETENCIES, &[row]) {
        return store_err(&req.id, e);
    }
    ok(&req.id, json!({ "code": code, "category": category }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let code = match require_param(req, "code") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    // Phase rows that already reference the code keep it; only the catalog
    // entry goes away.
    match state.delete_matching(SHEET_COMPETENCIES, &[("code", &code)]) {
        Ok(0) => err(&req.id, "not_found", format!("no such competency: {}", code), None),
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "competencies.list" => Some(handle_list(state, req)),
        "competencies.add" => Some(handle_add(state, req)),
        "competencies.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
