//! String-to-string JSON stores keyed by session key.
//!
//! Backs both `names.json` (custom labels) and `groups.json` (custom group
//! assignments). Every mutation is written through before the lock is
//! released.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::storage::{load_json_or_default, write_json_atomic};

pub struct KvStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl KvStore {
    /// Loads `path`; a missing or corrupt file starts empty.
    pub fn load(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            data: Mutex::new(load_json_or_default(path)),
        }
    }

    /// Value for `key`, or `""` when unset.
    pub fn get(&self, key: &str) -> String {
        self.lock().get(key).cloned().unwrap_or_default()
    }

    /// Sets `key`. A blank value deletes the entry.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        self.update(|data| match value {
            "" => data.remove(key).is_some(),
            _ => data.insert(key.to_string(), value.to_string()).as_deref() != Some(value),
        })?;
        Ok(())
    }

    pub fn all(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    /// Drops entries whose key is not live. Returns whether anything changed.
    pub fn retain_live(&self, live: &HashSet<String>) -> Result<bool> {
        self.update(|data| {
            let before = data.len();
            data.retain(|key, _| live.contains(key));
            data.len() != before
        })
    }

    /// Moves the entry for `from` to `to` unless `to` already has one.
    pub fn rekey(&self, from: &str, to: &str) -> Result<bool> {
        self.update(|data| {
            let Some(value) = data.remove(from) else {
                return false;
            };
            data.entry(to.to_string()).or_insert(value);
            true
        })
    }

    /// Applies `change` to a copy and commits it once the write succeeds.
    fn update<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut data = self.lock();
        let mut next = data.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        write_json_atomic(&self.path, &next)?;
        *data = next;
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> KvStore {
        KvStore::load(&temp.path().join("names.json"))
    }

    #[test]
    fn test_set_get_and_reload() {
        let temp = TempDir::new().unwrap();
        let kv = store(&temp);
        kv.set("session:a", "api server").unwrap();
        assert_eq!(kv.get("session:a"), "api server");
        assert_eq!(kv.get("session:b"), "");

        assert_eq!(store(&temp).get("session:a"), "api server");
    }

    #[test]
    fn test_empty_value_deletes() {
        let temp = TempDir::new().unwrap();
        let kv = store(&temp);
        kv.set("k", "v").unwrap();
        kv.set("k", "  ").unwrap();
        assert!(kv.all().is_empty());
        assert!(store(&temp).all().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty_then_overwritten() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("groups.json");
        std::fs::write(&path, "not json").unwrap();

        let kv = KvStore::load(&path);
        assert!(kv.all().is_empty());
        kv.set("pane:%1", "backend").unwrap();
        assert_eq!(KvStore::load(&path).get("pane:%1"), "backend");
    }

    #[test]
    fn test_retain_live_prunes_and_persists() {
        let temp = TempDir::new().unwrap();
        let kv = store(&temp);
        kv.set("live", "a").unwrap();
        kv.set("dead", "b").unwrap();
        let live: HashSet<String> = ["live".to_string()].into_iter().collect();

        assert!(kv.retain_live(&live).unwrap());
        assert!(!kv.retain_live(&live).unwrap());
        assert_eq!(store(&temp).all().len(), 1);
    }

    #[test]
    fn test_rekey_keeps_existing_target() {
        let temp = TempDir::new().unwrap();
        let kv = store(&temp);
        kv.set("pane:%1", "old").unwrap();
        assert!(kv.rekey("pane:%1", "session:a").unwrap());
        assert_eq!(kv.get("session:a"), "old");
        assert_eq!(kv.get("pane:%1"), "");

        kv.set("pane:%2", "other").unwrap();
        kv.rekey("pane:%2", "session:a").unwrap();
        assert_eq!(kv.get("session:a"), "old");
        assert!(!kv.rekey("missing", "x").unwrap());
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let kv = KvStore::load(&blocker.join("names.json"));
        assert!(kv.set("session:a", "api").is_err());
        assert_eq!(kv.get("session:a"), "");
    }
}
