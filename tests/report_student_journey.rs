
use serde_json::json;
use test_support::{
    add_and_login_student, open_workspace_as_teacher, request_err, request_ok, spawn_sidecar,
    temp_dir,
};

fn seed_journey(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    student: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        "seed-1",
        "phase1.save",
        json!({
            "token": student,
            "data": {
                "companyName": "Acme",
                "mainActivity": "Publicidad online",
                "digitalPresence": "Web y redes activas",
                "competencies": [
                    { "code": "COM2", "rationale": "comunican mucho", "level": "Intermedio" },
                    { "code": "HAB9", "rationale": "equipos", "level": "Básico" },
                ],
            },
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-2",
        "phase2.save",
        json!({
            "token": student,
            "data": {
                "companyName": "Acme",
                "contactPerson": "Luis",
                "contactRole": "CTO",
                "advice": "aprended SQL",
            },
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-3",
        "phase3.saveCompetencies",
        json!({
            "token": student,
            "data": {
                "companyName": "Acme",
                "competencies": [
                    { "code": "COM2", "rationale": "confirmado", "level": "Avanzado", "change": "Nivel ajustado" },
                    { "code": "CON6", "rationale": "lo vi en el stand", "level": "Básico", "change": "Cambiada" },
                ],
            },
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-4",
        "phase3.saveReflection",
        json!({
            "token": student,
            "data": { "mostDemanded": "COM2", "experienceRating": "4" },
        }),
    );
}

#[test]
fn report_covers_all_three_phases_and_diffs_the_selections() {
    let workspace = temp_dir("skillsmap-report");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);
    let ana = add_and_login_student(&mut stdin, &mut reader, &teacher, "ana01", "Ana García", "G1");
    seed_journey(&mut stdin, &mut reader, &ana);

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "report.student",
        json!({ "token": ana }),
    );

    assert_eq!(
        report.pointer("/student/username").and_then(|v| v.as_str()),
        Some("ana01")
    );
    let phase1 = report.get("phase1").and_then(|v| v.as_array()).unwrap();
    assert_eq!(phase1.len(), 1);
    assert_eq!(
        phase1[0].get("companyName").and_then(|v| v.as_str()),
        Some("Acme")
    );
    assert_eq!(
        phase1[0]
            .get("competencies")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(2)
    );

    let phase2 = report.get("phase2").and_then(|v| v.as_array()).unwrap();
    assert_eq!(phase2[0].get("advice").and_then(|v| v.as_str()), Some("aprended SQL"));

    assert_eq!(
        report
            .pointer("/phase3/reflection/experienceRating")
            .and_then(|v| v.as_str()),
        Some("4")
    );

    assert_eq!(report.pointer("/summary/kept"), Some(&json!(["COM2"])));
    assert_eq!(report.pointer("/summary/added"), Some(&json!(["CON6"])));
    assert_eq!(report.pointer("/summary/dropped"), Some(&json!(["HAB9"])));

    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn teacher_can_pull_any_students_report_but_needs_a_username() {
    let workspace = temp_dir("skillsmap-report-teacher");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);
    let ana = add_and_login_student(&mut stdin, &mut reader, &teacher, "ana01", "Ana", "G1");
    seed_journey(&mut stdin, &mut reader, &ana);

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "report.student",
        json!({ "token": teacher, "username": "ana01" }),
    );
    assert_eq!(
        report.pointer("/student/username").and_then(|v| v.as_str()),
        Some("ana01")
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "r2",
        "report.student",
        json!({ "token": teacher }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "r3",
        "report.student",
        json!({ "token": teacher, "username": "nobody" }),
    );
    assert_eq!(code, "not_found");

    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn chart_compares_own_picks_with_the_group_average() {
    let workspace = temp_dir("skillsmap-chart");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let teacher = open_workspace_as_teacher(&mut stdin, &mut reader, &workspace);
    let ana = add_and_login_student(&mut stdin, &mut reader, &teacher, "ana01", "Ana", "G1");
    let pedro = add_and_login_student(&mut stdin, &mut reader, &teacher, "pedro02", "Pedro", "G1");

    for (i, token) in [&ana, &pedro].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "phase1.save",
            json!({
                "token": token,
                "data": {
                    "companyName": "Acme",
                    "mainActivity": "algo",
                    "competencies": [{ "code": "COM2" }],
                },
            }),
        );
    }

    let chart = request_ok(
        &mut stdin,
        &mut reader,
        "chart",
        "chart.mine",
        json!({ "token": ana }),
    );
    assert_eq!(chart.get("students").and_then(|v| v.as_u64()), Some(2));
    let codes = chart.get("codes").and_then(|v| v.as_array()).unwrap();
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0].get("code").and_then(|v| v.as_str()), Some("COM2"));
    assert_eq!(codes[0].get("v1").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(codes[0].get("v2").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(codes[0].get("groupAvg").and_then(|v| v.as_f64()), Some(1.0));

    let _ = std::fs::remove_dir_all(&workspace);
}
