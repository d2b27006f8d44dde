use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::catalog::Catalog;
use crate::phases::REFLECTION_SENTINEL;
use crate::store::{norm, Table};

/// Read-side rollups for the teacher view. Everything here is recomputed per
/// request over cached table reads; nothing writes back.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProgress {
    pub group: String,
    pub students: usize,
    pub phase1_pct: u32,
    pub phase2_pct: u32,
    pub phase3_pct: u32,
}

/// Distinct usernames with at least one row in the table.
pub fn distinct_users(table: &Table) -> usize {
    let Some(ci) = table.column_index("username") else {
        return 0;
    };
    let users: HashSet<String> = table
        .rows
        .iter()
        .filter_map(|row| row.get(ci))
        .map(|v| norm(v))
        .filter(|v| !v.is_empty())
        .collect();
    users.len()
}

fn completion_pct(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round() as u32
}

fn users_in_phase(table: &Table) -> HashSet<String> {
    let Some(ci) = table.column_index("username") else {
        return HashSet::new();
    };
    table
        .rows
        .iter()
        .filter_map(|row| row.get(ci))
        .map(|v| norm(v))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Per-group completion: share of the group's members with at least one row
/// in each phase table, rounded to the nearest integer percent. A group with
/// no members reports 0, never a division error.
pub fn group_progress(
    users: &Table,
    phase1: &Table,
    phase2: &Table,
    phase3: &Table,
) -> Vec<GroupProgress> {
    let mut members: HashMap<String, Vec<String>> = HashMap::new();
    if let (Some(ui), Some(gi)) = (users.column_index("username"), users.column_index("group")) {
        for row in &users.rows {
            let username = norm(row.get(ui).map(String::as_str).unwrap_or(""));
            if username.is_empty() {
                continue;
            }
            let group = row.get(gi).map(|g| g.trim().to_string()).unwrap_or_default();
            members.entry(group).or_default().push(username);
        }
    }

    let done1 = users_in_phase(phase1);
    let done2 = users_in_phase(phase2);
    let done3 = users_in_phase(phase3);

    let mut groups: Vec<String> = members.keys().cloned().collect();
    groups.sort();

    groups
        .into_iter()
        .map(|group| {
            let users = &members[&group];
            let total = users.len();
            let n1 = users.iter().filter(|u| done1.contains(*u)).count();
            let n2 = users.iter().filter(|u| done2.contains(*u)).count();
            let n3 = users.iter().filter(|u| done3.contains(*u)).count();
            GroupProgress {
                group,
                students: total,
                phase1_pct: completion_pct(n1, total),
                phase2_pct: completion_pct(n2, total),
                phase3_pct: completion_pct(n3, total),
            }
        })
        .collect()
}

/// Count of rows per competency code, most frequent first; ties break by
/// catalog insertion order so the ranking is stable across renders. Phase 3
/// reflection rows carry no code and are skipped via the sentinel check.
pub fn competency_frequency(table: &Table, catalog: &Catalog) -> Vec<(String, usize)> {
    let Some(ci) = table.column_index("competency_code") else {
        return Vec::new();
    };
    let company_idx = table.column_index("company_name");

    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in &table.rows {
        if let Some(coi) = company_idx {
            let company = row.get(coi).map(String::as_str).unwrap_or("");
            if company.trim() == REFLECTION_SENTINEL {
                continue;
            }
        }
        let code = row.get(ci).map(|c| c.trim()).unwrap_or("");
        if code.is_empty() {
            continue;
        }
        *counts.entry(code.to_string()).or_insert(0) += 1;
    }

    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| {
        b.1.cmp(&a.1).then_with(|| {
            let pa = catalog.position(&a.0).unwrap_or(usize::MAX);
            let pb = catalog.position(&b.0).unwrap_or(usize::MAX);
            pa.cmp(&pb).then_with(|| a.0.cmp(&b.0))
        })
    });
    out
}

/// Counts of the non-empty `change_vs_v1` tags from Phase 3.
pub fn change_breakdown(phase3: &Table) -> Vec<(String, usize)> {
    count_column(phase3, "change_vs_v1")
}

/// Companies ranked by number of Phase 2 conversations.
pub fn company_visits(phase2: &Table) -> Vec<(String, usize)> {
    count_column(phase2, "company_name")
}

fn count_column(table: &Table, column: &str) -> Vec<(String, usize)> {
    let Some(ci) = table.column_index(column) else {
        return Vec::new();
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for row in &table.rows {
        let value = row.get(ci).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            continue;
        }
        if !counts.contains_key(value) {
            order.push(value.to_string());
        }
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = order
        .into_iter()
        .map(|k| {
            let n = counts[&k];
            (k, n)
        })
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

/// The "what companies miss from university" quotes collected during the
/// event, for the teacher view.
pub fn university_gaps(phase2: &Table, limit: usize) -> Vec<String> {
    let Some(ci) = phase2.column_index("university_gap") else {
        return Vec::new();
    };
    phase2
        .rows
        .iter()
        .filter_map(|row| row.get(ci))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .take(limit)
        .collect()
}
