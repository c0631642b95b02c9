//! Baseline persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::product::{ProductSnapshot, SnapshotSet};
use crate::shared::errors::StoreError;
use crate::shared::types::Asin;

const STATE_VERSION: u32 = 1;

/// Load/save capability for the baseline snapshot set
pub trait StateStore: Send + Sync {
    /// Previous snapshot set; empty when no state exists yet
    fn load(&self) -> Result<SnapshotSet, StoreError>;

    /// Replace the stored snapshot set. Either the whole set is written or nothing changes.
    fn save(&self, snapshots: &SnapshotSet) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    saved_at: DateTime<Utc>,
    products: BTreeMap<Asin, ProductSnapshot>,
}

/// JSON file store, replaced atomically through a temporary file in the same directory
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self) -> Result<SnapshotSet, StoreError> {
        let path_str = self.path.display().to_string();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path_str, "No previous state, starting from an empty baseline");
                return Ok(SnapshotSet::new());
            }
            Err(source) => return Err(StoreError::Read { path: path_str, source }),
        };

        let file: StateFile = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path_str.clone(),
            source,
        })?;
        if file.version != STATE_VERSION {
            return Err(StoreError::UnsupportedVersion(file.version));
        }

        info!(path = %path_str, products = file.products.len(), saved_at = %file.saved_at, "Baseline loaded");
        Ok(file.products.into_values().collect())
    }

    fn save(&self, snapshots: &SnapshotSet) -> Result<(), StoreError> {
        let path_str = self.path.display().to_string();
        let write_err = |source| StoreError::Write {
            path: path_str.clone(),
            source,
        };

        let file = StateFile {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            products: snapshots.iter().map(|s| (s.asin.clone(), s.clone())).collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        info!(path = %path_str, products = snapshots.len(), "Baseline saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::StockStatus;
    use crate::shared::types::Money;
    use rust_decimal::Decimal;

    fn sample() -> SnapshotSet {
        let mut iron = ProductSnapshot::new("B0CC944LHR".parse().unwrap(), "スチームアイロン", Utc::now());
        iron.price = Some(Money::new(Decimal::new(158050, 2), "JPY"));
        iron.list_price = Some(Money::new(Decimal::from(1980), "JPY"));
        iron.in_stock = StockStatus::Available;
        iron.sold_by_amazon = Some(true);
        iron.seller = Some("Amazon.co.jp".to_string());
        iron.image_url = Some("https://m.media-amazon.com/images/I/iron.jpg".to_string());

        let cola = ProductSnapshot::new("B004Y9IXZW".parse().unwrap(), "Cola", Utc::now());
        vec![iron, cola].into_iter().collect()
    }

    #[test]
    fn test_missing_file_is_empty_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("asin_results.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("state").join("asin_results.json"));
        let snapshots = sample();

        store.save(&snapshots).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.len(), 2);
        for original in snapshots.iter() {
            assert_eq!(loaded.get(&original.asin), Some(original));
        }
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asin_results.json");
        fs::write(&path, "[{\"asin\": ").unwrap();
        let store = JsonFileStateStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asin_results.json");
        fs::write(&path, r#"{"version": 9, "saved_at": "2024-01-15T12:00:00Z", "products": {}}"#).unwrap();
        let store = JsonFileStateStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::UnsupportedVersion(9))));
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("asin_results.json"));
        store.save(&sample()).unwrap();
        store.save(&sample()).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asin_results.json");
        let store = JsonFileStateStore::new(&path);
        store.save(&sample()).unwrap();
        let before = fs::read(&path).unwrap();

        // Target replaced by a directory: persist must fail without touching it
        let blocked = JsonFileStateStore::new(dir.path());
        assert!(blocked.save(&sample()).is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
    }
}
