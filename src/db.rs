use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::store::{StoreError, Workbook};

/// Local workbook backend. Sheets are stored schemalessly: one row per sheet
/// with its fixed header, one row per data row with the cells as a JSON
/// array, ordered by insertion position. This mirrors the append-only
/// spreadsheet model: no SQL-level schema per sheet, headers fixed at
/// creation and never migrated.
pub struct LocalBook {
    conn: Connection,
}

pub fn open_book(workspace: &Path) -> anyhow::Result<LocalBook> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("skillsmap.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sheets(
            name TEXT PRIMARY KEY,
            header TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sheet_rows(
            sheet TEXT NOT NULL,
            pos INTEGER NOT NULL,
            cells TEXT NOT NULL,
            PRIMARY KEY(sheet, pos),
            FOREIGN KEY(sheet) REFERENCES sheets(name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sheet_rows_sheet ON sheet_rows(sheet, pos)",
        [],
    )?;

    Ok(LocalBook { conn })
}

fn backend_err(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl LocalBook {
    fn header(&self, title: &str) -> Result<Vec<String>, StoreError> {
        let header: Option<String> = self
            .conn
            .query_row(
                "SELECT header FROM sheets WHERE name = ?",
                [title],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend_err)?;
        let Some(header) = header else {
            return Err(StoreError::MissingSheet(title.to_string()));
        };
        serde_json::from_str(&header).map_err(json_err)
    }

    fn next_pos(&self, title: &str) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(pos), 0) + 1 FROM sheet_rows WHERE sheet = ?",
                [title],
                |row| row.get(0),
            )
            .map_err(backend_err)
    }
}

impl Workbook for LocalBook {
    fn sheet_titles(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sheets ORDER BY rowid")
            .map_err(backend_err)?;
        stmt.query_map([], |row| row.get::<_, String>(0))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(backend_err)
    }

    fn add_sheet(&mut self, title: &str, header: &[&str]) -> Result<(), StoreError> {
        let header_json = serde_json::to_string(header).map_err(json_err)?;
        self.conn
            .execute(
                "INSERT INTO sheets(name, header) VALUES(?, ?)",
                (title, &header_json),
            )
            .map_err(backend_err)?;
        Ok(())
    }

    fn get_all_values(&self, title: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let header = self.header(title)?;
        let mut stmt = self
            .conn
            .prepare("SELECT cells FROM sheet_rows WHERE sheet = ? ORDER BY pos")
            .map_err(backend_err)?;
        let cells: Vec<String> = stmt
            .query_map([title], |row| row.get::<_, String>(0))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(backend_err)?;

        let mut out = vec![header];
        for raw in cells {
            out.push(serde_json::from_str(&raw).map_err(json_err)?);
        }
        Ok(out)
    }

    fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        // Appending to a sheet that was never created fails the same way a
        // remote worksheet lookup would.
        self.header(title)?;
        let mut pos = self.next_pos(title)?;
        let tx = self.conn.transaction().map_err(backend_err)?;
        for row in rows {
            let cells = serde_json::to_string(row).map_err(json_err)?;
            tx.execute(
                "INSERT INTO sheet_rows(sheet, pos, cells) VALUES(?, ?, ?)",
                (title, pos, &cells),
            )
            .map_err(backend_err)?;
            pos += 1;
        }
        tx.commit().map_err(backend_err)?;
        Ok(())
    }

    fn delete_data_row(&mut self, title: &str, index: usize) -> Result<(), StoreError> {
        self.header(title)?;
        let pos: Option<i64> = self
            .conn
            .query_row(
                "SELECT pos FROM sheet_rows WHERE sheet = ? ORDER BY pos LIMIT 1 OFFSET ?",
                (title, index as i64),
                |row| row.get(0),
            )
            .optional()
            .map_err(backend_err)?;
        let Some(pos) = pos else {
            return Err(StoreError::Backend(format!(
                "row index {} out of range for sheet {}",
                index, title
            )));
        };
        self.conn
            .execute(
                "DELETE FROM sheet_rows WHERE sheet = ? AND pos = ?",
                (title, pos),
            )
            .map_err(backend_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_workspace(tag: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("skillsmap-db-{}-{}", tag, nanos))
    }

    #[test]
    fn sheets_survive_reopen() {
        let workspace = temp_workspace("reopen");
        {
            let mut book = open_book(&workspace).unwrap();
            book.add_sheet("Users", &["username", "group"]).unwrap();
            book.append_rows("Users", &[vec!["ana01".to_string(), "G1".to_string()]])
                .unwrap();
        }
        let book = open_book(&workspace).unwrap();
        assert_eq!(book.sheet_titles().unwrap(), vec!["Users"]);
        let values = book.get_all_values("Users").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1][0], "ana01");
        let _ = std::fs::remove_dir_all(&workspace);
    }

    #[test]
    fn delete_by_data_index_keeps_order() {
        let workspace = temp_workspace("delete");
        let mut book = open_book(&workspace).unwrap();
        book.add_sheet("T", &["v"]).unwrap();
        book.append_rows(
            "T",
            &[
                vec!["a".to_string()],
                vec!["b".to_string()],
                vec!["c".to_string()],
            ],
        )
        .unwrap();
        book.delete_data_row("T", 1).unwrap();
        let values = book.get_all_values("T").unwrap();
        assert_eq!(values[1][0], "a");
        assert_eq!(values[2][0], "c");
        assert!(book.delete_data_row("T", 5).is_err());
        let _ = std::fs::remove_dir_all(&workspace);
    }

    #[test]
    fn missing_sheet_is_reported() {
        let workspace = temp_workspace("missing");
        let book = open_book(&workspace).unwrap();
        match book.get_all_values("Nope") {
            Err(StoreError::MissingSheet(name)) => assert_eq!(name, "Nope"),
            other => panic!("expected missing sheet, got {:?}", other),
        }
        let _ = std::fs::remove_dir_all(&workspace);
    }
}
