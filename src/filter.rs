use serde::Serialize;

use crate::store::{norm, Table};

/// Identity of an authenticated student, resolved from the session token and
/// passed explicitly to anything that filters or writes per-student data.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCtx {
    pub username: String,
    pub display_name: String,
    pub group: String,
}

/// Identity columns tried in order. Older sheets predate the `username`
/// column and identify rows by display name or a legacy `student` column.
const IDENTITY_TIERS: [(&str, IdentityField); 3] = [
    ("username", IdentityField::Username),
    ("display_name", IdentityField::DisplayName),
    ("student", IdentityField::DisplayName),
];

#[derive(Clone, Copy)]
enum IdentityField {
    Username,
    DisplayName,
}

/// Rows of `table` that belong to `ctx`, matched case-insensitively after
/// trimming. Tiers are tried in order and the first tier with any match wins.
/// When no tier matches the result is empty, never the whole table, so blank
/// identity fields cannot leak other students' rows.
pub fn filter_for_student(table: &Table, ctx: &SessionCtx) -> Table {
    for (column, field) in IDENTITY_TIERS {
        let value = match field {
            IdentityField::Username => &ctx.username,
            IdentityField::DisplayName => &ctx.display_name,
        };
        let wanted = norm(value);
        if wanted.is_empty() {
            continue;
        }
        let Some(ci) = table.column_index(column) else {
            continue;
        };
        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .filter(|row| row.get(ci).map(|v| norm(v) == wanted).unwrap_or(false))
            .cloned()
            .collect();
        if !rows.is_empty() {
            return Table {
                name: table.name.clone(),
                header: table.header.clone(),
                rows,
            };
        }
    }
    Table {
        name: table.name.clone(),
        header: table.header.clone(),
        rows: Vec::new(),
    }
}
