use serde_json::json;

use crate::filter::SessionCtx;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_param, require_workspace, store_err};
use crate::ipc::types::{AppState, Request};
use crate::phases::SHEET_USERS;
use crate::store::norm;

/// Student login against the user sheet. Username and access code are both
/// matched trimmed and case-insensitively. Wrong username and wrong access
/// code produce the same error, so the response never confirms whether a
/// username exists.
fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let username = match require_param(req, "username") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    let access_code = match require_param(req, "accessCode") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };

    let users = match state.read_table(SHEET_USERS) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, e),
    };

    let wanted = norm(&username);
    let wanted_code = norm(&access_code);
    let found = users.rows.iter().find(|row| {
        norm(users.value(row, "username")) == wanted
            && norm(users.value(row, "access_code")) == wanted_code
    });
    let Some(row) = found else {
        return err(&req.id, "bad_credentials", "invalid username or access code", None);
    };

    let ctx = SessionCtx {
        username: users.value(row, "username").trim().to_string(),
        display_name: users.value(row, "display_name").trim().to_string(),
        group: users.value(row, "group").trim().to_string(),
    };
    let token = state.sessions.new_student(ctx.clone());
    ok(&req.id, json!({ "token": token, "student": ctx }))
}

fn handle_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let password = match require_param(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if password != state.config.teacher_password {
        return err(&req.id, "bad_credentials", "invalid password", None);
    }
    let token = state.sessions.new_teacher();
    ok(&req.id, json!({ "token": token }))
}

/// Dropping an unknown token still succeeds; logout is idempotent.
fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let token = match require_param(req, "token") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let dropped = state.sessions.drop_token(token);
    ok(&req.id, json!({ "dropped": dropped }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.teacher" => Some(handle_teacher(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        _ => None,
    }
}
