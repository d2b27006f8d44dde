//! Response envelopes for the JSON-lines protocol. Every handler returns
//! either `ok(id, result)` or `err(id, code, ...)` with one of the daemon's
//! stable codes (`bad_params`, `validation_failed`, `bad_credentials`,
//! `unauthorized`, `no_workspace`, `store_failed`, `not_found`, `io_failed`),
//! so a request can fail without ever taking the loop down.

use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}
