use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;
use uuid::Uuid;

use crate::cache::TableCache;
use crate::db;
use crate::filter::SessionCtx;
use crate::phases::{
    SHEET_COMPANIES, SHEET_COMPETENCIES, SHEET_PHASE1, SHEET_PHASE2, SHEET_PHASE3, SHEET_USERS,
};
use crate::store::{RetryPolicy, SheetStore, StoreError, Table};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

const DEFAULT_TEACHER_PASSWORD: &str = "digcomlab2026";

/// Workspace config, read from `config.json` next to the workbook. Absent
/// file or fields fall back to defaults so a bare directory works.
#[derive(Debug, Clone)]
pub struct Config {
    pub teacher_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            teacher_password: DEFAULT_TEACHER_PASSWORD.to_string(),
        }
    }
}

impl Config {
    pub fn load(workspace: &Path) -> Self {
        let path = workspace.join("config.json");
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Config::default();
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            return Config::default();
        };
        let teacher_password = value
            .get("teacherPassword")
            .and_then(|v| v.as_str())
            .filter(|p| !p.trim().is_empty())
            .map(|p| p.to_string())
            .unwrap_or_else(|| DEFAULT_TEACHER_PASSWORD.to_string());
        Config { teacher_password }
    }
}

/// Issued session tokens. Student tokens carry the resolved identity so
/// handlers never re-derive it from request params.
#[derive(Default)]
pub struct Sessions {
    students: HashMap<String, SessionCtx>,
    teachers: HashSet<String>,
}

impl Sessions {
    pub fn new_student(&mut self, ctx: SessionCtx) -> String {
        let token = Uuid::new_v4().to_string();
        self.students.insert(token.clone(), ctx);
        token
    }

    pub fn new_teacher(&mut self) -> String {
        let token = Uuid::new_v4().to_string();
        self.teachers.insert(token.clone());
        token
    }

    pub fn student(&self, token: &str) -> Option<&SessionCtx> {
        self.students.get(token)
    }

    pub fn is_teacher(&self, token: &str) -> bool {
        self.teachers.contains(token)
    }

    pub fn drop_token(&mut self, token: &str) -> bool {
        self.students.remove(token).is_some() || self.teachers.remove(token)
    }

    pub fn clear(&mut self) {
        self.students.clear();
        self.teachers.clear();
    }
}

/// Open workbook handles go stale; reopen after this long.
const BOOK_TTL: Duration = Duration::from_secs(300);

pub struct OpenBook {
    pub store: SheetStore,
    opened_at: Instant,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub config: Config,
    pub book: Option<OpenBook>,
    pub cache: TableCache,
    pub sessions: Sessions,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(retry: RetryPolicy) -> Self {
        AppState {
            workspace: None,
            config: Config::default(),
            book: None,
            cache: TableCache::new(),
            sessions: Sessions::default(),
            retry,
        }
    }

    /// Point the daemon at a workspace directory, (re)opening its workbook
    /// and dropping all cached tables and issued sessions.
    pub fn select_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let local = db::open_book(&path)?;
        self.config = Config::load(&path);
        self.book = Some(OpenBook {
            store: SheetStore::new(Box::new(local), self.retry.clone()),
            opened_at: Instant::now(),
        });
        self.workspace = Some(path);
        self.cache.clear();
        self.sessions.clear();
        Ok(())
    }

    /// Reopen the workbook when its handle has outlived its TTL. Cached
    /// tables stay; they carry their own expiry.
    fn refresh_book(&mut self) -> Result<(), StoreError> {
        let stale = match &self.book {
            Some(book) => book.opened_at.elapsed() >= BOOK_TTL,
            None => return Err(StoreError::Backend("no workspace selected".to_string())),
        };
        if stale {
            let workspace = self
                .workspace
                .clone()
                .ok_or_else(|| StoreError::Backend("no workspace selected".to_string()))?;
            let local =
                db::open_book(&workspace).map_err(|e| StoreError::Backend(e.to_string()))?;
            self.book = Some(OpenBook {
                store: SheetStore::new(Box::new(local), self.retry.clone()),
                opened_at: Instant::now(),
            });
        }
        Ok(())
    }

    fn no_workspace() -> StoreError {
        StoreError::Backend("no workspace selected".to_string())
    }

    /// Cached table read with the per-table TTL.
    pub fn read_table(&mut self, name: &str) -> Result<Table, StoreError> {
        self.refresh_book()?;
        let book = match &self.book {
            Some(book) => &book.store,
            None => return Err(Self::no_workspace()),
        };
        self.cache
            .get_or_load(name, ttl_for(name), || book.read_table(name))
    }

    /// Append rows and invalidate the cached table so the next read sees
    /// this write.
    pub fn append(&mut self, name: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        self.with_store(|store| store.append_rows(name, rows))?;
        self.cache.invalidate(name);
        Ok(())
    }

    /// Delete-then-append upsert on the natural key, with cache invalidation.
    pub fn upsert(
        &mut self,
        name: &str,
        predicates: &[(&str, &str)],
        rows: &[Vec<String>],
    ) -> Result<usize, StoreError> {
        let deleted = self.with_store(|store| store.upsert(name, predicates, rows));
        // Invalidate even on failure: a failed append after a successful
        // delete must not leave stale rows in the cache.
        self.cache.invalidate(name);
        deleted
    }

    pub fn delete_matching(
        &mut self,
        name: &str,
        predicates: &[(&str, &str)],
    ) -> Result<usize, StoreError> {
        let deleted = self.with_store(|store| store.delete_rows_matching(name, predicates));
        self.cache.invalidate(name);
        deleted
    }

    pub fn with_store<T>(
        &mut self,
        f: impl FnOnce(&mut SheetStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.refresh_book()?;
        match &mut self.book {
            Some(book) => f(&mut book.store),
            None => Err(Self::no_workspace()),
        }
    }
}

fn ttl_for(name: &str) -> Duration {
    match name {
        SHEET_USERS => Duration::from_secs(15),
        SHEET_COMPANIES | SHEET_COMPETENCIES => Duration::from_secs(60),
        SHEET_PHASE1 | SHEET_PHASE2 | SHEET_PHASE3 => Duration::from_secs(30),
        _ => Duration::from_secs(30),
    }
}
