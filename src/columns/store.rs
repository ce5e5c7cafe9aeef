use anyhow::{Context, Result};
use std::{
    collections::btree_map::Entry,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, error, info};

use super::types::cache_key;
use super::write::{read_entries, write_entries, CacheEntries};
use super::{ColumnDescriptor, QueryColumn};

/// Storage namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "insights_columns";

/// Best-known metadata for every `(table, column)` ever fetched.
///
/// First write wins: once a key is stored, later batches never replace it.
/// The whole map is flushed to `<dir>/<namespace>.json` whenever an ingest
/// adds something.
pub struct ColumnCache {
    /// Map: "<table>_<column>" → descriptor. The lock makes check-then-insert atomic.
    entries: Mutex<CacheEntries>,
    path: Option<PathBuf>,
}

impl ColumnCache {
    /// Open (or create) the cache persisted under `dir`.
    pub fn open<P: AsRef<Path>>(dir: P, namespace: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("creating cache dir {:?}", dir))?;
        let path = dir.join(format!("{}.json", namespace));

        let entries = match read_entries(&path) {
            Ok(Some(entries)) => {
                info!(path = %path.display(), count = entries.len(), "loaded column cache");
                entries
            }
            Ok(None) => CacheEntries::new(),
            Err(e) => {
                error!("Ignoring corrupt column cache {:?}: {:#}", path, e);
                CacheEntries::new()
            }
        };

        Ok(Self {
            entries: Mutex::new(entries),
            path: Some(path),
        })
    }

    /// A cache with no persistence boundary.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(CacheEntries::new()),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, CacheEntries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store every descriptor whose key is not yet present. Returns how many
    /// were added; the store is flushed only when that is non-zero.
    ///
    /// Nothing is kept in memory unless it reached disk: on a failed flush
    /// the new keys are dropped again, so a later ingest retries them.
    pub fn ingest<'a, I>(&self, batch: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a ColumnDescriptor>,
    {
        let mut entries = self.lock();
        let mut added = Vec::new();
        for desc in batch {
            if let Entry::Vacant(slot) = entries.entry(desc.key()) {
                added.push(slot.key().clone());
                slot.insert(desc.clone());
            }
        }

        if added.is_empty() {
            return Ok(0);
        }
        debug!(added = added.len(), total = entries.len(), "column cache grew");

        // flush while still holding the lock so writers never interleave
        if let Some(path) = &self.path {
            if let Err(e) = write_entries(path, &entries) {
                for key in &added {
                    entries.remove(key);
                }
                return Err(e).with_context(|| format!("flushing column cache to {:?}", path));
            }
        }
        Ok(added.len())
    }

    pub fn lookup(&self, table: &str, column: &str) -> Option<ColumnDescriptor> {
        self.lock().get(&cache_key(table, column)).cloned()
    }

    /// Resolve a committed column; needs both identity fields.
    pub fn lookup_column(&self, column: &QueryColumn) -> Option<ColumnDescriptor> {
        match (&column.table, &column.column) {
            (Some(table), Some(name)) => self.lookup(table, name),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn col(table: &str, column: &str, label: &str) -> ColumnDescriptor {
        ColumnDescriptor::new(table, column).with_label(label)
    }

    #[test]
    fn first_write_wins() {
        let cache = ColumnCache::in_memory();
        assert_eq!(cache.ingest(&[col("t", "c", "A")]).unwrap(), 1);
        assert_eq!(cache.ingest(&[col("t", "c", "B")]).unwrap(), 0);
        assert_eq!(cache.lookup("t", "c").unwrap().label.as_deref(), Some("A"));
    }

    #[test]
    fn first_write_wins_within_a_batch() {
        let cache = ColumnCache::in_memory();
        let batch = vec![col("t", "c", "A"), col("t", "c", "B"), col("t", "d", "D")];
        assert_eq!(cache.ingest(&batch).unwrap(), 2);
        assert_eq!(cache.lookup("t", "c").unwrap().label.as_deref(), Some("A"));
    }

    #[test]
    fn reingesting_identical_batch_is_idempotent() {
        let cache = ColumnCache::in_memory();
        let batch = vec![col("orders", "id", "ID"), col("orders", "total", "Total")];
        cache.ingest(&batch).unwrap();
        let before: Vec<_> = batch
            .iter()
            .map(|c| cache.lookup(&c.table, &c.column))
            .collect();

        assert_eq!(cache.ingest(&batch).unwrap(), 0);
        let after: Vec<_> = batch
            .iter()
            .map(|c| cache.lookup(&c.table, &c.column))
            .collect();
        assert_eq!(before, after);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn lookup_miss_and_lookup_column() {
        let cache = ColumnCache::in_memory();
        cache.ingest(&[col("orders", "id", "ID")]).unwrap();
        assert!(cache.lookup("orders", "missing").is_none());

        let committed = QueryColumn::new("orders", "id");
        assert_eq!(cache.lookup_column(&committed).unwrap().label.as_deref(), Some("ID"));

        let no_table = QueryColumn {
            column: Some("id".into()),
            ..Default::default()
        };
        assert!(cache.lookup_column(&no_table).is_none());
    }

    #[test]
    fn persistence_across_restarts() {
        let tmp = tempdir().unwrap();
        {
            let cache = ColumnCache::open(tmp.path(), DEFAULT_NAMESPACE).unwrap();
            assert!(cache.is_empty());
            cache.ingest(&[col("orders", "id", "ID")]).unwrap();
        }

        let cache = ColumnCache::open(tmp.path(), DEFAULT_NAMESPACE).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("orders", "id").unwrap().label.as_deref(), Some("ID"));

        // still first-write-wins after reload
        cache.ingest(&[col("orders", "id", "Other")]).unwrap();
        assert_eq!(cache.lookup("orders", "id").unwrap().label.as_deref(), Some("ID"));
    }

    #[test]
    fn persisted_format_is_flat_key_map() {
        let tmp = tempdir().unwrap();
        let cache = ColumnCache::open(tmp.path(), "cols").unwrap();
        cache.ingest(&[col("orders", "id", "ID")]).unwrap();

        let text = fs::read_to_string(tmp.path().join("cols.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["orders_id"]["table"], "orders");
        assert_eq!(v["orders_id"]["column"], "id");
        assert_eq!(v["orders_id"]["label"], "ID");
    }

    #[test]
    fn failed_flush_is_retried_by_next_ingest() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("cache");
        let cache = ColumnCache::open(&dir, DEFAULT_NAMESPACE).unwrap();
        let batch = vec![col("orders", "id", "ID")];

        fs::remove_dir_all(&dir).unwrap();
        assert!(cache.ingest(&batch).is_err());
        assert!(cache.lookup("orders", "id").is_none());
        assert!(cache.is_empty());

        fs::create_dir_all(&dir).unwrap();
        assert_eq!(cache.ingest(&batch).unwrap(), 1);

        let reopened = ColumnCache::open(&dir, DEFAULT_NAMESPACE).unwrap();
        assert_eq!(reopened.lookup("orders", "id").unwrap().label.as_deref(), Some("ID"));
    }

    #[test]
    fn corrupt_file_starts_empty_and_is_rewritten() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(format!("{}.json", DEFAULT_NAMESPACE));
        fs::write(&path, "{ definitely not json").unwrap();

        let cache = ColumnCache::open(tmp.path(), DEFAULT_NAMESPACE).unwrap();
        assert!(cache.is_empty());

        cache.ingest(&[col("orders", "id", "ID")]).unwrap();
        let reopened = ColumnCache::open(tmp.path(), DEFAULT_NAMESPACE).unwrap();
        assert_eq!(reopened.len(), 1);
    }
}
