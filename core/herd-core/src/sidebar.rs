//! Persisted pin counters and explicit session order.
//!
//! ```json
//! { "pinned": { "session:abc": 1, "pane:%3": 2 }, "order": ["pane:%7", "session:def"] }
//! ```
//!
//! Pinned keys sort by ascending counter. Unpinned keys sort by their
//! position in `order`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{load_json_or_default, write_json_atomic};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarState {
    #[serde(default)]
    pub pinned: BTreeMap<String, u64>,
    #[serde(default)]
    pub order: Vec<String>,
    /// Last counter handed out. Never persisted; recovered from `pinned`.
    #[serde(skip)]
    counter: u64,
}

impl SidebarState {
    pub fn is_pinned(&self, key: &str) -> bool {
        self.pinned.contains_key(key)
    }

    /// Pins `key` with the next counter value. Re-pinning keeps the
    /// existing counter.
    pub fn pin(&mut self, key: &str) -> u64 {
        if let Some(existing) = self.pinned.get(key) {
            return *existing;
        }
        let highest = self.pinned.values().copied().max().unwrap_or(0);
        self.counter = self.counter.max(highest) + 1;
        self.pinned.insert(key.to_string(), self.counter);
        self.counter
    }

    pub fn unpin(&mut self, key: &str) -> bool {
        self.pinned.remove(key).is_some()
    }

    /// Swaps the counters of two pinned keys.
    pub fn swap_pins(&mut self, a: &str, b: &str) -> bool {
        match (self.pinned.get(a).copied(), self.pinned.get(b).copied()) {
            (Some(pa), Some(pb)) => {
                self.pinned.insert(a.to_string(), pb);
                self.pinned.insert(b.to_string(), pa);
                true
            }
            _ => false,
        }
    }

    /// Drops pins and order entries whose key is not in `live`.
    pub fn prune(&mut self, live: &HashSet<String>) -> bool {
        let pins_before = self.pinned.len();
        let order_before = self.order.len();
        self.pinned.retain(|key, _| live.contains(key));
        self.order.retain(|key| live.contains(key));
        pins_before != self.pinned.len() || order_before != self.order.len()
    }

    /// Moves any pin/order entry from `from` to `to`.
    pub fn rekey(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        if let Some(counter) = self.pinned.remove(from) {
            self.pinned.entry(to.to_string()).or_insert(counter);
            changed = true;
        }
        if self.order.iter().any(|k| k == to) {
            let before = self.order.len();
            self.order.retain(|k| k != from);
            changed |= before != self.order.len();
        } else if let Some(slot) = self.order.iter_mut().find(|k| *k == from) {
            *slot = to.to_string();
            changed = true;
        }
        changed
    }
}

/// Write-through store around [`SidebarState`].
pub struct SidebarStore {
    path: PathBuf,
    state: Mutex<SidebarState>,
}

impl SidebarStore {
    pub fn load(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            state: Mutex::new(load_json_or_default(path)),
        }
    }

    pub fn snapshot(&self) -> SidebarState {
        self.lock().clone()
    }

    /// Applies `change` to a copy and, when it reports a change, persists
    /// it. Memory only takes the new state once the write succeeds.
    pub fn update<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut SidebarState) -> bool,
    {
        let mut state = self.lock();
        let mut next = state.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        write_json_atomic(&self.path, &next)?;
        *state = next;
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SidebarState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
