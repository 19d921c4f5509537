//! Durable fallback beneath the in-memory menu cache.
//!
//! A keyed `date -> (breakfast, lunch)` store with upsert-by-key and
//! delete-before-today. Keys are full dates so pruning stays correct across
//! a year boundary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::StoreError;
use crate::menu::DayMenu;

pub type StoredRows = BTreeMap<NaiveDate, DayMenu>;

pub trait MenuStore: Send {
    fn upsert(&mut self, date: NaiveDate, day: &DayMenu) -> Result<(), StoreError>;
    // Remove rows dated before `today`, returning how many went
    fn prune_before(&mut self, today: NaiveDate) -> Result<usize, StoreError>;
    fn load(&self) -> Result<StoredRows, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: StoredRows,
}

impl MemoryStore {
    pub fn from_rows(rows: StoredRows) -> Self {
        Self { rows }
    }
}

impl MenuStore for MemoryStore {
    fn upsert(&mut self, date: NaiveDate, day: &DayMenu) -> Result<(), StoreError> {
        self.rows.insert(date, day.clone());
        Ok(())
    }

    fn prune_before(&mut self, today: NaiveDate) -> Result<usize, StoreError> {
        let before = self.rows.len();
        self.rows.retain(|date, _| *date >= today);
        Ok(before - self.rows.len())
    }

    fn load(&self) -> Result<StoredRows, StoreError> {
        Ok(self.rows.clone())
    }
}

/// JSON file store. Every mutation rewrites the file through a temporary
/// sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    rows: MemoryStore,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let rows = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredRows::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), rows = rows.len(), "opened menu store");
        Ok(Self {
            path,
            rows: MemoryStore::from_rows(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let encoded = serde_json::to_string_pretty(&self.rows.rows)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, encoded).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl MenuStore for JsonFileStore {
    fn upsert(&mut self, date: NaiveDate, day: &DayMenu) -> Result<(), StoreError> {
        self.rows.upsert(date, day)?;
        self.persist()
    }

    fn prune_before(&mut self, today: NaiveDate) -> Result<usize, StoreError> {
        let removed = self.rows.prune_before(today)?;
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    fn load(&self) -> Result<StoredRows, StoreError> {
        self.rows.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::MealEntry;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn day(tag: &str) -> DayMenu {
        DayMenu {
            breakfast: MealEntry::new(format!("Breakfast {tag}"), "rice"),
            lunch: MealEntry::new(format!("Lunch {tag}"), "soup"),
        }
    }

    #[test]
    fn upsert_replaces_by_key() {
        let mut store = MemoryStore::default();
        store.upsert(date(10, 14), &day("a")).unwrap();
        store.upsert(date(10, 14), &day("b")).unwrap();
        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[&date(10, 14)], day("b"));
    }

    #[test]
    fn prune_removes_only_past_days() {
        let mut store = MemoryStore::default();
        for d in [12, 13, 14, 15] {
            store.upsert(date(10, d), &day("x")).unwrap();
        }
        assert_eq!(store.prune_before(date(10, 14)).unwrap(), 2);
        let keys: Vec<_> = store.load().unwrap().into_keys().collect();
        assert_eq!(keys, vec![date(10, 14), date(10, 15)]);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menus.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        assert!(store.load().unwrap().is_empty());
        store.upsert(date(12, 31), &day("eve")).unwrap();
        store.upsert(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(), &day("new")).unwrap();
        assert_eq!(store.prune_before(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()).unwrap(), 1);

        let reopened = JsonFileStore::open(&path).unwrap();
        let rows = reopened.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.values().next().unwrap(), &day("new"));
    }
}
