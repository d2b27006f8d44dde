use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::Catalog;
use crate::filter::SessionCtx;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::phases::SHEET_COMPETENCIES;
use crate::store::StoreError;

pub fn param_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn require_param<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    match param_str(req, key) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("missing params.{}", key),
            None,
        )),
    }
}

/// Deserialize `params.data` into a typed payload; serde errors come back
/// as `bad_params` with the message serde produced.
pub fn parse_data<T: DeserializeOwned>(req: &Request) -> Result<T, Value> {
    let data = req.params.get("data").cloned().unwrap_or(Value::Null);
    serde_json::from_value(data)
        .map_err(|e| err(&req.id, "bad_params", format!("invalid params.data: {}", e), None))
}

pub fn require_workspace(state: &AppState, req: &Request) -> Result<(), Value> {
    if state.workspace.is_none() {
        return Err(err(&req.id, "no_workspace", "no workspace selected", None));
    }
    Ok(())
}

/// Resolve the student session behind `params.token`. Unknown or teacher
/// tokens are rejected the same way, without leaking which it was.
pub fn require_student(state: &AppState, req: &Request) -> Result<SessionCtx, Value> {
    let token = require_param(req, "token")?;
    match state.sessions.student(token) {
        Some(ctx) => Ok(ctx.clone()),
        None => Err(err(&req.id, "unauthorized", "not a valid student session", None)),
    }
}

pub fn require_teacher(state: &AppState, req: &Request) -> Result<(), Value> {
    let token = require_param(req, "token")?;
    if state.sessions.is_teacher(token) {
        Ok(())
    } else {
        Err(err(&req.id, "unauthorized", "not a valid teacher session", None))
    }
}

/// Any authenticated session, student or teacher.
pub fn require_session(state: &AppState, req: &Request) -> Result<(), Value> {
    let token = require_param(req, "token")?;
    if state.sessions.is_teacher(token) || state.sessions.student(token).is_some() {
        Ok(())
    } else {
        Err(err(&req.id, "unauthorized", "not a valid session", None))
    }
}

pub fn store_err(id: &str, e: StoreError) -> Value {
    match e {
        StoreError::RateLimited => err(
            id,
            "store_failed",
            "store rate limit exceeded after retries",
            None,
        ),
        other => err(id, "store_failed", other.to_string(), None),
    }
}

/// Catalog as currently stored, falling back to the built-in defaults when
/// the competency sheet is empty.
pub fn load_catalog(state: &mut AppState, req: &Request) -> Result<Catalog, Value> {
    let table = state
        .read_table(SHEET_COMPETENCIES)
        .map_err(|e| store_err(&req.id, e))?;
    if table.is_empty() {
        return Ok(Catalog::default_catalog());
    }
    let rows: Vec<(String, String, String)> = table
        .rows
        .iter()
        .map(|row| {
            (
                table.value(row, "code").to_string(),
                table.value(row, "category").to_string(),
                table.value(row, "description").to_string(),
            )
        })
        .collect();
    Ok(Catalog::from_rows(&rows))
}
