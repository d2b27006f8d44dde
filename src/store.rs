use std::collections::HashMap;
use std::fmt;
use std::thread;
use std::time::Duration;

/// Failure taxonomy for workbook operations. `RateLimited` is the only
/// transient variant; the adapter retries it, everything else propagates.
#[derive(Debug, Clone)]
pub enum StoreError {
    RateLimited,
    MissingSheet(String),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::RateLimited => write!(f, "store rate limit exceeded"),
            StoreError::MissingSheet(name) => write!(f, "sheet not found: {}", name),
            StoreError::Backend(msg) => write!(f, "store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// The commodity spreadsheet seam. Backends only provide raw worksheet
/// operations; retries, matching and upsert semantics live in `SheetStore`.
pub trait Workbook {
    fn sheet_titles(&self) -> Result<Vec<String>, StoreError>;
    fn add_sheet(&mut self, title: &str, header: &[&str]) -> Result<(), StoreError>;
    /// All values including the header row.
    fn get_all_values(&self, title: &str) -> Result<Vec<Vec<String>>, StoreError>;
    fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Result<(), StoreError>;
    /// Delete one data row by 0-based index (header excluded).
    fn delete_data_row(&mut self, title: &str, index: usize) -> Result<(), StoreError>;
}

/// One sheet snapshot: header order is preserved for CSV export; `records`
/// gives header-keyed access for everything else.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn empty(name: &str) -> Self {
        Table {
            name: name.to_string(),
            header: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|h| h == column)
    }

    pub fn value<'a>(&self, row: &'a [String], column: &str) -> &'a str {
        self.column_index(column)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn records(&self) -> Vec<HashMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.header
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Trimmed case-insensitive normalization used everywhere identity or key
/// columns are compared.
pub fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Backoff schedule for transient failures plus the pause between bulk row
/// deletes. Tests swap in `immediate()` so nothing sleeps.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff: Vec<Duration>,
    pub delete_pause: Duration,
}

impl RetryPolicy {
    pub fn standard() -> Self {
        RetryPolicy {
            backoff: vec![
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(8),
            ],
            delete_pause: Duration::from_millis(200),
        }
    }

    pub fn immediate() -> Self {
        RetryPolicy {
            backoff: vec![Duration::ZERO; 3],
            delete_pause: Duration::ZERO,
        }
    }
}

fn with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut attempt = 0usize;
    loop {
        match op() {
            Err(StoreError::RateLimited) if attempt < policy.backoff.len() => {
                thread::sleep(policy.backoff[attempt]);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Persistent store adapter: tabular read/append/delete with retry on rate
/// limits. All writes go through here; caching sits on top (see `cache.rs`).
pub struct SheetStore {
    book: Box<dyn Workbook>,
    retry: RetryPolicy,
}

impl SheetStore {
    pub fn new(book: Box<dyn Workbook>, retry: RetryPolicy) -> Self {
        SheetStore { book, retry }
    }

    pub fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        let values = with_retry(&self.retry, || self.book.get_all_values(name))?;
        let mut iter = values.into_iter();
        let header = iter.next().unwrap_or_default();
        Ok(Table {
            name: name.to_string(),
            header,
            rows: iter.collect(),
        })
    }

    pub fn append_rows(&mut self, name: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let book = &mut self.book;
        with_retry(&self.retry, || book.append_rows(name, rows))
    }

    /// Delete every row where all (column, value) predicates match after
    /// trimming and case folding. Indices are deleted highest-first so earlier
    /// deletes cannot shift the remaining targets; a short pause between
    /// deletes keeps bulk removals under the backend's rate limit.
    pub fn delete_rows_matching(
        &mut self,
        name: &str,
        predicates: &[(&str, &str)],
    ) -> Result<usize, StoreError> {
        let table = self.read_table(name)?;
        let wanted: Vec<(Option<usize>, String)> = predicates
            .iter()
            .map(|(column, value)| (table.column_index(column), norm(value)))
            .collect();

        let mut matches: Vec<usize> = Vec::new();
        for (i, row) in table.rows.iter().enumerate() {
            let hit = wanted.iter().all(|(idx, want)| match idx {
                Some(ci) => row.get(*ci).map(|v| norm(v) == *want).unwrap_or(false),
                None => false,
            });
            if hit {
                matches.push(i);
            }
        }

        let deleted = matches.len();
        let book = &mut self.book;
        for (n, &i) in matches.iter().rev().enumerate() {
            if n > 0 && !self.retry.delete_pause.is_zero() {
                thread::sleep(self.retry.delete_pause);
            }
            with_retry(&self.retry, || book.delete_data_row(name, i))?;
        }
        Ok(deleted)
    }

    /// Delete-then-append upsert. Not transactional: a failure after the
    /// delete leaves the natural key without rows until the next successful
    /// save; callers surface either failure as a save error.
    pub fn upsert(
        &mut self,
        name: &str,
        predicates: &[(&str, &str)],
        rows: &[Vec<String>],
    ) -> Result<usize, StoreError> {
        let deleted = self.delete_rows_matching(name, predicates)?;
        self.append_rows(name, rows)?;
        Ok(deleted)
    }

    /// Create the sheet with its fixed header if missing. Headers are never
    /// migrated afterwards. Returns true when the sheet was created.
    pub fn ensure_sheet(&mut self, name: &str, header: &[&str]) -> Result<bool, StoreError> {
        let titles = {
            let book = &self.book;
            with_retry(&self.retry, || book.sheet_titles())?
        };
        if titles.iter().any(|t| t == name) {
            return Ok(false);
        }
        let book = &mut self.book;
        with_retry(&self.retry, || book.add_sheet(name, header))?;
        Ok(true)
    }
}

/// In-memory workbook used by unit tests: counts reads and can be primed to
/// fail the next N operations with a rate-limit error. The read counter is
/// shared so tests can keep a handle after boxing the book into a store.
#[cfg(test)]
pub struct MemoryBook {
    sheets: Vec<MemorySheet>,
    reads: std::rc::Rc<std::cell::Cell<usize>>,
    fail_next: std::cell::Cell<usize>,
}

#[cfg(test)]
struct MemorySheet {
    title: String,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[cfg(test)]
impl MemoryBook {
    pub fn new() -> Self {
        MemoryBook {
            sheets: Vec::new(),
            reads: std::rc::Rc::new(std::cell::Cell::new(0)),
            fail_next: std::cell::Cell::new(0),
        }
    }

    pub fn read_counter(&self) -> std::rc::Rc<std::cell::Cell<usize>> {
        std::rc::Rc::clone(&self.reads)
    }

    pub fn fail_next(&mut self, calls: usize) {
        self.fail_next.set(calls);
    }

    fn gate(&self) -> Result<(), StoreError> {
        let remaining = self.fail_next.get();
        if remaining > 0 {
            self.fail_next.set(remaining - 1);
            return Err(StoreError::RateLimited);
        }
        Ok(())
    }

    fn sheet(&self, title: &str) -> Result<&MemorySheet, StoreError> {
        self.sheets
            .iter()
            .find(|s| s.title == title)
            .ok_or_else(|| StoreError::MissingSheet(title.to_string()))
    }

    fn sheet_mut(&mut self, title: &str) -> Result<&mut MemorySheet, StoreError> {
        self.sheets
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| StoreError::MissingSheet(title.to_string()))
    }
}

#[cfg(test)]
impl Default for MemoryBook {
    fn default() -> Self {
        MemoryBook::new()
    }
}

#[cfg(test)]
impl Workbook for MemoryBook {
    fn sheet_titles(&self) -> Result<Vec<String>, StoreError> {
        self.gate()?;
        Ok(self.sheets.iter().map(|s| s.title.clone()).collect())
    }

    fn add_sheet(&mut self, title: &str, header: &[&str]) -> Result<(), StoreError> {
        self.gate()?;
        self.sheets.push(MemorySheet {
            title: title.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        });
        Ok(())
    }

    fn get_all_values(&self, title: &str) -> Result<Vec<Vec<String>>, StoreError> {
        self.gate()?;
        self.reads.set(self.reads.get() + 1);
        let sheet = self.sheet(title)?;
        let mut out = vec![sheet.header.clone()];
        out.extend(sheet.rows.iter().cloned());
        Ok(out)
    }

    fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        self.gate()?;
        let sheet = self.sheet_mut(title)?;
        sheet.rows.extend(rows.iter().cloned());
        Ok(())
    }

    fn delete_data_row(&mut self, title: &str, index: usize) -> Result<(), StoreError> {
        self.gate()?;
        let sheet = self.sheet_mut(title)?;
        if index >= sheet.rows.len() {
            return Err(StoreError::Backend(format!(
                "row index {} out of range for sheet {}",
                index, title
            )));
        }
        sheet.rows.remove(index);
        Ok(())
    }
}
