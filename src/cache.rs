use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::store::{StoreError, Table};

/// Time-boxed cache in front of every table read. This is a rate-limit
/// shield, not a coherence protocol: a writer invalidates its own table
/// synchronously (read-your-writes within the process), while other sessions
/// may see data up to one TTL old.
pub struct TableCache {
    entries: HashMap<String, CacheEntry>,
}

struct CacheEntry {
    loaded_at: Instant,
    ttl: Duration,
    table: Table,
}

impl TableCache {
    pub fn new() -> Self {
        TableCache {
            entries: HashMap::new(),
        }
    }

    pub fn get_or_load(
        &mut self,
        name: &str,
        ttl: Duration,
        loader: impl FnOnce() -> Result<Table, StoreError>,
    ) -> Result<Table, StoreError> {
        if let Some(entry) = self.entries.get(name) {
            if entry.loaded_at.elapsed() < entry.ttl {
                return Ok(entry.table.clone());
            }
        }
        let table = loader()?;
        self.entries.insert(
            name.to_string(),
            CacheEntry {
                loaded_at: Instant::now(),
                ttl,
                table: table.clone(),
            },
        );
        Ok(table)
    }

    pub fn invalidate(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for TableCache {
    fn default() -> Self {
        TableCache::new()
    }
}
