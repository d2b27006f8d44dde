use std::collections::HashSet;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{param_str, require_param, require_teacher, require_workspace, store_err};
use crate::ipc::types::{AppState, Request};
use crate::phases::{now_timestamp, SHEET_USERS};
use crate::store::{norm, Table};

fn guard(state: &AppState, req: &Request) -> Result<(), serde_json::Value> {
    require_workspace(state, req)?;
    require_teacher(state, req)
}

fn existing_usernames(users: &Table) -> HashSet<String> {
    users
        .rows
        .iter()
        .map(|row| norm(users.value(row, "username")))
        .filter(|u| !u.is_empty())
        .collect()
}

/// Roster for the teacher view. Access codes are credentials and never
/// leave the daemon; the column is masked in place.
fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = guard(state, req) {
        return resp;
    }
    let users = match state.read_table(SHEET_USERS) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    let rows: Vec<serde_json::Value> = users
        .rows
        .iter()
        .map(|row| {
            json!({
                "username": users.value(row, "username"),
                "accessCode": "***",
                "displayName": users.value(row, "display_name"),
                "group": users.value(row, "group"),
                "registeredAt": users.value(row, "registered_at"),
            })
        })
        .collect();
    ok(&req.id, json!({ "users": rows }))
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = guard(state, req) {
        return resp;
    }
    let username = match require_param(req, "username") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    let access_code = match require_param(req, "accessCode") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    let display_name = param_str(req, "displayName").unwrap_or("").trim().to_string();
    let group = param_str(req, "group").unwrap_or("").trim().to_string();

    let users = match state.read_table(SHEET_USERS) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    if existing_usernames(&users).contains(&norm(&username)) {
        return err(
            &req.id,
            "validation_failed",
            format!("username already exists: {}", username),
            None,
        );
    }

    let row = vec![username.clone(), access_code, display_name, group, now_timestamp()];
    if let Err(e) = state.append(SHEET_USERS, &[row]) {
        return store_err(&req.id, e);
    }
    ok(&req.id, json!({ "username": username }))
}

/// Bulk roster import. One user per line, four comma-separated fields:
/// username, access code, display name, group. Bad lines are reported with
/// their line number and do not abort the rest; duplicates (against the
/// sheet or earlier lines) are skipped and reported with their line too.
fn handle_bulk_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = guard(state, req) {
        return resp;
    }
    let lines = match require_param(req, "lines") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };

    let users = match state.read_table(SHEET_USERS) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };
    let mut seen = existing_usernames(&users);

    let timestamp = now_timestamp();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut duplicates: Vec<serde_json::Value> = Vec::new();
    let mut errors: Vec<serde_json::Value> = Vec::new();

    for (i, line) in lines.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            errors.push(json!({
                "line": line_no,
                "message": format!("expected 4 fields, got {}", fields.len()),
            }));
            continue;
        }
        let (username, access_code, display_name, group) =
            (fields[0], fields[1], fields[2], fields[3]);
        if username.is_empty() || access_code.is_empty() {
            errors.push(json!({
                "line": line_no,
                "message": "username and access code must not be empty",
            }));
            continue;
        }
        let key = norm(username);
        if seen.contains(&key) {
            duplicates.push(json!({ "line": line_no, "username": username }));
            continue;
        }
        seen.insert(key);
        rows.push(vec![
            username.to_string(),
            access_code.to_string(),
            display_name.to_string(),
            group.to_string(),
            timestamp.clone(),
        ]);
    }

    if let Err(e) = state.append(SHEET_USERS, &rows) {
        return store_err(&req.id, e);
    }
    ok(
        &req.id,
        json!({
            "added": rows.len(),
            "skipped": duplicates.len(),
            "duplicates": duplicates,
            "errors": errors,
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = guard(state, req) {
        return resp;
    }
    let username = match require_param(req, "username") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    match state.delete_matching(SHEET_USERS, &[("username", &username)]) {
        Ok(0) => err(&req.id, "not_found", format!("no such user: {}", username), None),
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_list(state, req)),
        "users.add" => Some(handle_add(state, req)),
        "users.bulkAdd" => Some(handle_bulk_add(state, req)),
        "users.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
