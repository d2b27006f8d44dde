
use serde_json::json;
use test_support::{open_workspace_as_teacher, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn sheets_init_creates_all_sheets_and_seeds_the_catalog_once() {
    let workspace = temp_dir("skillsmap-init");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let auth = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.teacher",
        json!({ "password": "digcomlab2026" }),
    );
    let token = auth.get("token").and_then(|v| v.as_str()).unwrap().to_string();

    let init = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sheets.init",
        json!({ "token": token }),
    );
    let created = init.get("created").and_then(|v| v.as_array()).unwrap();
    assert_eq!(created.len(), 6);

    // Second init is a no-op.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sheets.init",
        json!({ "token": token }),
    );
    assert_eq!(
        again.get("created").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    // The seeded catalog: three categories, 22 entries in total.
    let list = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "competencies.list",
        json!({ "token": token }),
    );
    let categories = list.get("categories").and_then(|v| v.as_array()).unwrap();
    assert_eq!(categories.len(), 3);
    let total: usize = categories
        .iter()
        .map(|c| c["competencies"].as_array().map(|a| a.len()).unwrap_or(0))
        .sum();
    assert_eq!(total, 22);

    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn requests_before_workspace_selection_are_rejected() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "auth.login",
        json!({ "username": "ana01", "accessCode": "1234" }),
    );
    assert_eq!(resp.pointer("/error/code").and_then(|v| v.as_str()), Some("no_workspace"));

    // Health works without a workspace and reports none selected.
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn unknown_methods_report_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "nope.nothing", json!({}));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );
}

#[test]
fn teacher_password_can_be_overridden_in_workspace_config() {
    let workspace = temp_dir("skillsmap-config");
    std::fs::write(
        workspace.join("config.json"),
        r#"{ "teacherPassword": "otherpass" }"#,
    )
    .unwrap();
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "auth.teacher",
        json!({ "password": "digcomlab2026" }),
    );
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_credentials")
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.teacher",
        json!({ "password": "otherpass" }),
    );

    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn open_workspace_helper_round_trips() {
    let workspace = temp_dir("skillsmap-helper");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let token = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);
    let users = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "users.list",
        json!({ "token": token }),
    );
    assert_eq!(users.get("users").and_then(|v| v.as_array()).map(|a| a.len()), Some(0));
    let _ = std::fs::remove_dir_all(&workspace);
}
