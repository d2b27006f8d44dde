use serde_json::json;

use crate::filter::filter_for_student;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_catalog, parse_data, require_student, require_workspace, store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::phases::{now_timestamp, Phase1Payload, SHEET_PHASE1};

/// Save one company analysis. The natural key is (student, company): saving
/// again for the same company replaces the previous rows wholesale, so the
/// sheet never accumulates stale competency picks.
fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let ctx = match require_student(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let payload: Phase1Payload = match parse_data(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let catalog = match load_catalog(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(msg) = payload.validate(&catalog) {
        return err(&req.id, "validation_failed", msg, None);
    }

    let rows = payload.rows(&ctx, &catalog, &now_timestamp());
    let company = payload.company_name.trim().to_string();
    match state.upsert(
        SHEET_PHASE1,
        &[("username", &ctx.username), ("company_name", &company)],
        &rows,
    ) {
        Ok(replaced) => ok(&req.id, json!({ "saved": rows.len(), "replaced": replaced })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_mine(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let ctx = match require_student(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let table = match state.read_table(SHEET_PHASE1) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    let mine = filter_for_student(&table, &ctx);
    ok(&req.id, json!({ "rows": mine.records() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "phase1.save" => Some(handle_save(state, req)),
        "phase1.mine" => Some(handle_mine(state, req)),
        _ => None,
    }
}
