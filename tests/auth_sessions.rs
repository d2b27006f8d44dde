
use serde_json::json;
use test_support::{
    add_and_login_student, open_workspace_as_teacher, request_err, request_ok, spawn_sidecar,
    temp_dir,
};

#[test]
fn wrong_username_and_wrong_code_fail_identically() {
    let workspace = temp_dir("skillsmap-auth");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "users.add",
        json!({
            "token": teacher,
            "username": "ana01",
            "accessCode": "AbC1",
            "displayName": "Ana García",
            "group": "G1",
        }),
    );

    let unknown_user = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "username": "nobody", "accessCode": "AbC1" }),
    );
    let wrong_code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "auth.login",
        json!({ "username": "ana01", "accessCode": "9999" }),
    );
    assert_eq!(unknown_user, "bad_credentials");
    assert_eq!(wrong_code, "bad_credentials");

    // Both fields are matched trimmed and case-insensitively.
    let login = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        json!({ "username": " ANA01 ", "accessCode": "abc1" }),
    );
    assert_eq!(
        login.pointer("/student/username").and_then(|v| v.as_str()),
        Some("ana01")
    );
    assert_eq!(
        login.pointer("/student/group").and_then(|v| v.as_str()),
        Some("G1")
    );

    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn student_tokens_cannot_reach_teacher_methods() {
    let workspace = temp_dir("skillsmap-roles");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);
    let student = add_and_login_student(&mut stdin, &mut reader, &teacher, "ana01", "Ana", "G1");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "users.list",
        json!({ "token": student }),
    );
    assert_eq!(code, "unauthorized");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "dashboard.overview",
        json!({ "token": student }),
    );
    assert_eq!(code, "unauthorized");

    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn logout_invalidates_the_token_and_is_idempotent() {
    let workspace = temp_dir("skillsmap-logout");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);
    let student = add_and_login_student(&mut stdin, &mut reader, &teacher, "ana01", "Ana", "G1");

    let dropped = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "auth.logout",
        json!({ "token": student }),
    );
    assert_eq!(dropped.get("dropped").and_then(|v| v.as_bool()), Some(true));

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.logout",
        json!({ "token": student }),
    );
    assert_eq!(again.get("dropped").and_then(|v| v.as_bool()), Some(false));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "phase1.mine",
        json!({ "token": student }),
    );
    assert_eq!(code, "unauthorized");

    let _ = std::fs::remove_dir_all(&workspace);
}
