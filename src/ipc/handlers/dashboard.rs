use serde_json::json;

use crate::dashboard::{
    change_breakdown, company_visits, competency_frequency, distinct_users, group_progress,
    university_gaps,
};
use crate::filter::{filter_for_student, SessionCtx};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    load_catalog, param_str, require_student, require_teacher, require_workspace, store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::phases::{SHEET_PHASE1, SHEET_PHASE2, SHEET_PHASE3, SHEET_USERS};
use crate::report::{chart_counts, student_report};
use crate::store::{norm, Table};

const GAP_QUOTE_LIMIT: usize = 50;

fn read_phases(
    state: &mut AppState,
    req: &Request,
) -> Result<(Table, Table, Table, Table), serde_json::Value> {
    let users = state
        .read_table(SHEET_USERS)
        .map_err(|e| store_err(&req.id, e))?;
    let phase1 = state
        .read_table(SHEET_PHASE1)
        .map_err(|e| store_err(&req.id, e))?;
    let phase2 = state
        .read_table(SHEET_PHASE2)
        .map_err(|e| store_err(&req.id, e))?;
    let phase3 = state
        .read_table(SHEET_PHASE3)
        .map_err(|e| store_err(&req.id, e))?;
    Ok((users, phase1, phase2, phase3))
}

fn pairs(list: Vec<(String, usize)>) -> Vec<serde_json::Value> {
    list.into_iter()
        .map(|(key, count)| json!({ "key": key, "count": count }))
        .collect()
}

/// Everything the teacher dashboard shows in one response, computed from
/// cached table reads.
fn handle_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let catalog = match load_catalog(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (users, phase1, phase2, phase3) = match read_phases(state, req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    ok(
        &req.id,
        json!({
            "students": users.rows.len(),
            "participation": {
                "phase1": distinct_users(&phase1),
                "phase2": distinct_users(&phase2),
                "phase3": distinct_users(&phase3),
            },
            "groups": group_progress(&users, &phase1, &phase2, &phase3),
            "frequencyV1": pairs(competency_frequency(&phase1, &catalog)),
            "frequencyV2": pairs(competency_frequency(&phase3, &catalog)),
            "changes": pairs(change_breakdown(&phase3)),
            "companyVisits": pairs(company_visits(&phase2)),
            "universityGaps": university_gaps(&phase2, GAP_QUOTE_LIMIT),
        }),
    )
}

/// Resolve whose report to build: a student token gets their own, a teacher
/// token may name any username on the roster.
fn resolve_subject(
    state: &mut AppState,
    req: &Request,
) -> Result<SessionCtx, serde_json::Value> {
    if let Ok(ctx) = require_student(state, req) {
        return Ok(ctx);
    }
    require_teacher(state, req)?;
    let username = param_str(req, "username")
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", "missing params.username", None))?
        .to_string();
    let users = state
        .read_table(SHEET_USERS)
        .map_err(|e| store_err(&req.id, e))?;
    let wanted = norm(&username);
    let row = users
        .rows
        .iter()
        .find(|row| norm(users.value(row, "username")) == wanted)
        .ok_or_else(|| err(&req.id, "not_found", format!("no such user: {}", username), None))?;
    Ok(SessionCtx {
        username: users.value(row, "username").trim().to_string(),
        display_name: users.value(row, "display_name").trim().to_string(),
        group: users.value(row, "group").trim().to_string(),
    })
}

fn handle_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let ctx = match resolve_subject(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let catalog = match load_catalog(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (_, phase1, phase2, phase3) = match read_phases(state, req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let report = student_report(
        &ctx,
        &filter_for_student(&phase1, &ctx),
        &filter_for_student(&phase2, &ctx),
        &filter_for_student(&phase3, &ctx),
        &catalog,
    );
    ok(&req.id, report)
}

/// Per-code picks before and after the event for the student's own chart,
/// next to the group average.
fn handle_chart(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let ctx = match require_student(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let catalog = match load_catalog(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let phase1 = match state.read_table(SHEET_PHASE1) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    let phase3 = match state.read_table(SHEET_PHASE3) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };

    let chart = chart_counts(
        &filter_for_student(&phase1, &ctx),
        &filter_for_student(&phase3, &ctx),
        &phase1,
        &phase3,
        &catalog,
    );
    ok(&req.id, chart)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.overview" => Some(handle_overview(state, req)),
        "report.student" => Some(handle_report(state, req)),
        "chart.mine" => Some(handle_chart(state, req)),
        _ => None,
    }
}
