use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::filter::SessionCtx;
use crate::phases::REFLECTION_SENTINEL;
use crate::store::Table;

pub fn csv_quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Header plus every data row, RFC 4180 quoting, `\n` line endings.
pub fn table_to_csv(table: &Table) -> String {
    let mut out = String::new();
    let line = |cells: &[String]| {
        cells
            .iter()
            .map(|c| csv_quote(c))
            .collect::<Vec<_>>()
            .join(",")
    };
    out.push_str(&line(&table.header));
    out.push('\n');
    for row in &table.rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    pub entry_count: usize,
    pub path: String,
}

/// Write every table as `tables/<name>.csv` inside a zip at `out_path`,
/// alongside a small manifest. The bundle is a teacher-side export for
/// archival and offline analysis, not a restore format.
pub fn export_bundle(tables: &[Table], out_path: &Path) -> anyhow::Result<BundleSummary> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create export directory {}", parent.display()))?;
        }
    }
    let file = File::create(out_path)
        .with_context(|| format!("create export bundle {}", out_path.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let manifest = json!({
        "format": "skillsmap-export-v1",
        "exported_at": crate::phases::now_timestamp(),
        "tables": tables.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
    });
    zip.start_file("manifest.json", options)
        .context("write manifest")?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    for table in tables {
        zip.start_file(format!("tables/{}.csv", table.name), options)
            .with_context(|| format!("write table {}", table.name))?;
        zip.write_all(table_to_csv(table).as_bytes())?;
    }
    zip.finish().context("finalize export bundle")?;

    Ok(BundleSummary {
        entry_count: tables.len() + 1,
        path: out_path.display().to_string(),
    })
}

fn competency_entry(table: &Table, row: &[String], catalog: &Catalog, v2: bool) -> Value {
    let code = table.value(row, "competency_code");
    let mut entry = json!({
        "code": code,
        "kind": table.value(row, "competency_kind"),
        "description": catalog.description(code).unwrap_or(""),
    });
    if v2 {
        entry["rationale"] = json!(table.value(row, "rationale_v2"));
        entry["level"] = json!(table.value(row, "level_v2"));
        entry["change"] = json!(table.value(row, "change_vs_v1"));
    } else {
        entry["rationale"] = json!(table.value(row, "competency_rationale"));
        entry["level"] = json!(table.value(row, "competency_level"));
    }
    entry
}

fn phase1_sections(phase1: &Table, catalog: &Catalog) -> Vec<Value> {
    // Rows for one company share the analysis fields; group them back into
    // one section per company with the competencies nested.
    let mut sections: BTreeMap<String, Value> = BTreeMap::new();
    for row in &phase1.rows {
        let company = phase1.value(row, "company_name").to_string();
        let section = sections.entry(company.clone()).or_insert_with(|| {
            json!({
                "companyName": company,
                "companyId": phase1.value(row, "company_id"),
                "mainActivity": phase1.value(row, "main_activity"),
                "digitalPresence": phase1.value(row, "digital_presence"),
                "targetProfiles": phase1.value(row, "target_profiles"),
                "timestamp": phase1.value(row, "timestamp"),
                "competencies": [],
            })
        });
        if let Some(list) = section["competencies"].as_array_mut() {
            list.push(competency_entry(phase1, row, catalog, false));
        }
    }
    sections.into_values().collect()
}

fn phase2_conversations(phase2: &Table) -> Vec<Value> {
    phase2
        .rows
        .iter()
        .map(|row| {
            json!({
                "companyName": phase2.value(row, "company_name"),
                "contactPerson": phase2.value(row, "contact_person"),
                "contactRole": phase2.value(row, "contact_role"),
                "digitalWork": phase2.value(row, "digital_work"),
                "profilesSought": phase2.value(row, "profiles_sought"),
                "technicalSkills": phase2.value(row, "technical_skills"),
                "softSkills": phase2.value(row, "soft_skills"),
                "universityGap": phase2.value(row, "university_gap"),
                "internshipOpportunities": phase2.value(row, "internship_opportunities"),
                "advice": phase2.value(row, "advice"),
                "surprise": phase2.value(row, "surprise"),
                "timestamp": phase2.value(row, "timestamp"),
            })
        })
        .collect()
}

fn phase3_sections(phase3: &Table, catalog: &Catalog) -> (Vec<Value>, Option<Value>) {
    let mut sections: BTreeMap<String, Value> = BTreeMap::new();
    let mut reflection = None;
    for row in &phase3.rows {
        let company = phase3.value(row, "company_name");
        if company.trim() == REFLECTION_SENTINEL {
            reflection = Some(json!({
                "mostDemanded": phase3.value(row, "most_demanded"),
                "surprisingCompetencies": phase3.value(row, "surprising_competencies"),
                "universityGap": phase3.value(row, "university_gap"),
                "personalPositioning": phase3.value(row, "personal_positioning"),
                "actionPlan": phase3.value(row, "action_plan"),
                "experienceRating": phase3.value(row, "experience_rating"),
                "timestamp": phase3.value(row, "timestamp"),
            }));
            continue;
        }
        let section = sections.entry(company.to_string()).or_insert_with(|| {
            json!({
                "companyName": company,
                "timestamp": phase3.value(row, "timestamp"),
                "competencies": [],
            })
        });
        if let Some(list) = section["competencies"].as_array_mut() {
            list.push(competency_entry(phase3, row, catalog, true));
        }
    }
    (sections.into_values().collect(), reflection)
}

fn codes_in(table: &Table) -> HashSet<String> {
    let Some(ci) = table.column_index("competency_code") else {
        return HashSet::new();
    };
    let company_idx = table.column_index("company_name");
    table
        .rows
        .iter()
        .filter(|row| match company_idx {
            Some(i) => row
                .get(i)
                .map(|c| c.trim() != REFLECTION_SENTINEL)
                .unwrap_or(true),
            None => true,
        })
        .filter_map(|row| row.get(ci))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Comparative view of a student's journey: their own Phase 1 analyses,
/// Phase 2 conversations, Phase 3 re-assessment and reflection, plus a
/// before/after diff of the competency codes they picked. The caller passes
/// tables already filtered to this student.
pub fn student_report(
    ctx: &SessionCtx,
    phase1: &Table,
    phase2: &Table,
    phase3: &Table,
    catalog: &Catalog,
) -> Value {
    let (phase3_companies, reflection) = phase3_sections(phase3, catalog);

    let v1 = codes_in(phase1);
    let v2 = codes_in(phase3);
    let mut kept: Vec<&String> = v1.intersection(&v2).collect();
    let mut added: Vec<&String> = v2.difference(&v1).collect();
    let mut dropped: Vec<&String> = v1.difference(&v2).collect();
    let by_catalog = |a: &&String, b: &&String| {
        catalog
            .position(a)
            .unwrap_or(usize::MAX)
            .cmp(&catalog.position(b).unwrap_or(usize::MAX))
            .then_with(|| a.cmp(b))
    };
    kept.sort_by(by_catalog);
    added.sort_by(by_catalog);
    dropped.sort_by(by_catalog);

    json!({
        "student": {
            "username": ctx.username,
            "displayName": ctx.display_name,
            "group": ctx.group,
        },
        "generatedAt": crate::phases::now_timestamp(),
        "phase1": phase1_sections(phase1, catalog),
        "phase2": phase2_conversations(phase2),
        "phase3": {
            "companies": phase3_companies,
            "reflection": reflection,
        },
        "summary": {
            "kept": kept,
            "added": added,
            "dropped": dropped,
        },
    })
}

fn counts_per_code(table: &Table) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let Some(ci) = table.column_index("competency_code") else {
        return counts;
    };
    let company_idx = table.column_index("company_name");
    for row in &table.rows {
        if let Some(i) = company_idx {
            if row.get(i).map(|c| c.trim() == REFLECTION_SENTINEL).unwrap_or(false) {
                continue;
            }
        }
        let code = row.get(ci).map(|c| c.trim()).unwrap_or("");
        if code.is_empty() {
            continue;
        }
        *counts.entry(code.to_string()).or_insert(0) += 1;
    }
    counts
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Per-code comparison data for the student's own chart: how often they
/// picked each code before and after the event, next to the group average
/// (total picks across everyone divided by the number of distinct students,
/// one decimal). `mine1`/`mine3` are pre-filtered; `all1`/`all3` are the full
/// phase tables.
pub fn chart_counts(
    mine1: &Table,
    mine3: &Table,
    all1: &Table,
    all3: &Table,
    catalog: &Catalog,
) -> Value {
    let v1 = counts_per_code(mine1);
    let v2 = counts_per_code(mine3);
    let group1 = counts_per_code(all1);
    let group3 = counts_per_code(all3);

    let mut students: HashSet<String> = HashSet::new();
    for table in [all1, all3] {
        if let Some(ci) = table.column_index("username") {
            for row in &table.rows {
                let user = crate::store::norm(row.get(ci).map(String::as_str).unwrap_or(""));
                if !user.is_empty() {
                    students.insert(user);
                }
            }
        }
    }
    let population = students.len();

    let mut codes: Vec<String> = Vec::new();
    for (code, _) in catalog.flatten() {
        if v1.contains_key(&code)
            || v2.contains_key(&code)
            || group1.contains_key(&code)
            || group3.contains_key(&code)
        {
            codes.push(code);
        }
    }

    let series: Vec<Value> = codes
        .iter()
        .map(|code| {
            let total = group1.get(code).copied().unwrap_or(0)
                + group3.get(code).copied().unwrap_or(0);
            let group_avg = if population == 0 {
                0.0
            } else {
                round1(total as f64 / population as f64)
            };
            json!({
                "code": code,
                "v1": v1.get(code).copied().unwrap_or(0),
                "v2": v2.get(code).copied().unwrap_or(0),
                "groupAvg": group_avg,
            })
        })
        .collect();

    json!({ "codes": series, "students": population })
}
