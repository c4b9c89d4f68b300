//! Persisted page preferences: a string key-value store and the per-day
//! collapse state kept in it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::Result;

/// Key under which the per-day collapse map is stored.
pub const COLLAPSE_STATE_KEY: &str = "trip_collapsed_state";

/// Synchronous string key-value store.
pub trait KeyValueStore {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Store that lives only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable preferences {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read preferences {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    /// File backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the whole map atomically (write tmp + rename).
    fn persist(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&self.values)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// Which day cards are collapsed.
///
/// A day the user toggled keeps its stored choice. Any other day is
/// collapsed when it is already over.
#[derive(Debug, Clone)]
pub struct CollapseState {
    saved: BTreeMap<String, bool>,
    today: NaiveDate,
}

impl CollapseState {
    /// Reads the stored map. Malformed JSON is logged and treated as empty.
    #[must_use]
    pub fn load(store: &dyn KeyValueStore, today: NaiveDate) -> Self {
        let saved = store
            .get(COLLAPSE_STATE_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(saved) => Some(saved),
                Err(e) => {
                    log::warn!("Discarding unreadable collapse state: {e}");
                    None
                }
            })
            .unwrap_or_default();
        Self { saved, today }
    }

    /// Whether the user chose a state for `date`.
    #[must_use]
    pub fn has_preference(&self, date: NaiveDate) -> bool {
        self.saved.contains_key(&key(date))
    }

    /// Stored choice for `date`, else collapsed when `date` is before today.
    #[must_use]
    pub fn is_collapsed(&self, date: NaiveDate) -> bool {
        self.saved
            .get(&key(date))
            .copied()
            .unwrap_or(date < self.today)
    }

    /// Flips `date` and persists the whole map. Returns the new state.
    ///
    /// A failed write is logged; the in-memory state still changes.
    pub fn toggle(&mut self, store: &mut dyn KeyValueStore, date: NaiveDate) -> bool {
        let collapsed = !self.is_collapsed(date);
        self.saved.insert(key(date), collapsed);

        match serde_json::to_string(&self.saved) {
            Ok(json) => {
                if let Err(e) = store.set(COLLAPSE_STATE_KEY, &json) {
                    log::warn!("Failed to save collapse state: {e}");
                }
            }
            Err(e) => log::warn!("Failed to encode collapse state: {e}"),
        }
        collapsed
    }
}

fn key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    struct ReadOnlyStore(MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(crate::Error::Storage("read-only".to_string()))
        }
        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(crate::Error::Storage("read-only".to_string()))
        }
    }

    #[test]
    fn past_days_collapse_by_default() {
        let state = CollapseState::load(&MemoryStore::new(), date("2025-11-20"));
        assert!(state.is_collapsed(date("2025-11-19")));
        assert!(!state.is_collapsed(date("2025-11-20")));
        assert!(!state.is_collapsed(date("2025-11-21")));
    }

    #[test]
    fn stored_preference_wins() {
        let mut store = MemoryStore::new();
        store
            .set(COLLAPSE_STATE_KEY, r#"{"2025-11-19":false,"2025-11-22":true}"#)
            .unwrap();
        let state = CollapseState::load(&store, date("2025-11-20"));
        assert!(!state.is_collapsed(date("2025-11-19")));
        assert!(state.is_collapsed(date("2025-11-22")));
        assert!(state.has_preference(date("2025-11-22")));
        assert!(!state.has_preference(date("2025-11-21")));
    }

    #[test]
    fn toggle_persists() {
        let mut store = MemoryStore::new();
        let today = date("2025-11-20");
        let mut state = CollapseState::load(&store, today);

        assert!(state.toggle(&mut store, date("2025-11-21")));
        assert!(!state.toggle(&mut store, date("2025-11-19")));

        let reloaded = CollapseState::load(&store, today);
        assert!(reloaded.is_collapsed(date("2025-11-21")));
        assert!(!reloaded.is_collapsed(date("2025-11-19")));
    }

    #[test]
    fn malformed_state_is_ignored() {
        let mut store = MemoryStore::new();
        store.set(COLLAPSE_STATE_KEY, "{not json").unwrap();
        let state = CollapseState::load(&store, date("2025-11-20"));
        assert!(state.is_collapsed(date("2025-11-01")));
        assert!(!state.has_preference(date("2025-11-01")));
    }

    #[test]
    fn failed_write_still_toggles_in_memory() {
        let mut store = ReadOnlyStore(MemoryStore::new());
        let mut state = CollapseState::load(&store, date("2025-11-20"));
        assert!(state.toggle(&mut store, date("2025-11-25")));
        assert!(state.is_collapsed(date("2025-11-25")));
        assert!(store.get(COLLAPSE_STATE_KEY).is_none());
    }

    #[test]
    fn json_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("prefs.json");

        let mut store = JsonFileStore::open(&path);
        assert!(store.get("pwa_install_dismissed").is_none());
        store.set("pwa_install_dismissed", "true").unwrap();
        store.set("other", "x").unwrap();
        store.remove("other").unwrap();

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get("pwa_install_dismissed").as_deref(), Some("true"));
        assert!(reopened.get("other").is_none());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn json_file_store_tolerates_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, b"\x00garbage").unwrap();

        let mut store = JsonFileStore::open(&path);
        assert!(store.get("anything").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(JsonFileStore::open(&path).get("k").as_deref(), Some("v"));
    }
}
