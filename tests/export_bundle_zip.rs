
use std::io::Read;

use serde_json::json;
use test_support::{
    add_and_login_student, open_workspace_as_teacher, request_err, request_ok, spawn_sidecar,
    temp_dir,
};

#[test]
fn bundle_contains_a_manifest_and_all_six_tables() {
    let workspace = temp_dir("skillsmap-export");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);
    let ana = add_and_login_student(&mut stdin, &mut reader, &teacher, "ana01", "Ana", "G1");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "phase1.save",
        json!({
            "token": ana,
            "data": {
                "companyName": "Acme",
                "mainActivity": "algo",
                "competencies": [{ "code": "COM2" }],
            },
        }),
    );

    let out_path = workspace.join("export.zip");
    let bundle = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.bundle",
        json!({ "token": teacher, "path": out_path.to_string_lossy() }),
    );
    assert_eq!(bundle.get("entries").and_then(|v| v.as_u64()), Some(7));

    let file = std::fs::File::open(&out_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.contains(&"manifest.json".to_string()));
    for sheet in [
        "Users",
        "Companies",
        "Competencies",
        "Phase1_PreEvent",
        "Phase2_Event",
        "Phase3_PostEvent",
    ] {
        assert!(names.contains(&format!("tables/{}.csv", sheet)), "missing {}", sheet);
    }

    let mut phase1_csv = String::new();
    archive
        .by_name("tables/Phase1_PreEvent.csv")
        .unwrap()
        .read_to_string(&mut phase1_csv)
        .unwrap();
    assert!(phase1_csv.starts_with("timestamp,username,"));
    assert!(phase1_csv.contains("ana01"));
    assert!(phase1_csv.contains("COM2"));

    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn table_export_returns_csv_and_rejects_unknown_tables() {
    let workspace = temp_dir("skillsmap-export-table");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);

    let export = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "export.table",
        json!({ "token": teacher, "name": "Competencies" }),
    );
    assert_eq!(export.get("rows").and_then(|v| v.as_u64()), Some(22));
    let csv = export.get("csv").and_then(|v| v.as_str()).unwrap();
    assert!(csv.starts_with("code,category,description\n"));
    assert!(csv.contains("COM2"));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "export.table",
        json!({ "token": teacher, "name": "Secrets" }),
    );
    assert_eq!(code, "not_found");

    let _ = std::fs::remove_dir_all(&workspace);
}
