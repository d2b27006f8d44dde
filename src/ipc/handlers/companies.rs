use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    param_str, require_param, require_session, require_teacher, require_workspace, store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::phases::{company_slug, SHEET_COMPANIES};
use crate::store::norm;

/// Company directory for the research phase. Students and the teacher both
/// read it.
fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_session(state, req) {
        return resp;
    }
    let companies = match state.read_table(SHEET_COMPANIES) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    let rows: Vec<serde_json::Value> = companies
        .rows
        .iter()
        .map(|row| {
            json!({
                "id": companies.value(row, "id"),
                "name": companies.value(row, "name"),
                "sector": companies.value(row, "sector"),
                "web": companies.value(row, "web"),
                "description": companies.value(row, "description"),
            })
        })
        .collect();
    ok(&req.id, json!({ "companies": rows }))
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let name = match require_param(req, "name") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    let sector = param_str(req, "sector").unwrap_or("").trim().to_string();
    let web = param_str(req, "web").unwrap_or("").trim().to_string();
    let description = param_str(req, "description").unwrap_or("").trim().to_string();

    let companies = match state.read_table(SHEET_COMPANIES) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    let duplicate = companies
        .rows
        .iter()
        .any(|row| norm(companies.value(row, "name")) == norm(&name));
    if duplicate {
        return err(
            &req.id,
            "validation_failed",
            format!("company already exists: {}", name),
            None,
        );
    }

    let id = company_slug(&name);
    let row = vec![id.clone(), name.clone(), sector, web, description];
    if let Err(e) = state.append(SHEET_COMPANIES, &[row]) {
        return store_err(&req.id, e);
    }
    ok(&req.id, json!({ "id": id, "name": name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "companies.list" => Some(handle_list(state, req)),
        "companies.add" => Some(handle_add(state, req)),
        _ => None,
    }
}
