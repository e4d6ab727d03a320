//! Bounded most-recently-used list of command names.
//!
//! Stored least-recent-first (the persisted array has the same order) and
//! presented most-recent-first.

use std::collections::VecDeque;

use crate::host::StateStore;
use crate::state::RECENT_COMMANDS_KEY;

pub const DEFAULT_MAX_RECENT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyTracker {
    entries: VecDeque<String>,
    max: usize,
}

impl RecencyTracker {
    pub fn new(max: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max,
        }
    }

    /// Restore from the store. A missing or malformed value yields an empty
    /// list; blank names, duplicates and overflow are dropped keeping the
    /// newest entries.
    pub fn load(store: &dyn StateStore, max: usize) -> Self {
        let mut tracker = Self::new(max);
        let stored: Vec<String> = store
            .get(RECENT_COMMANDS_KEY)
            .and_then(|value| match serde_json::from_value(value) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!("Ignoring malformed {RECENT_COMMANDS_KEY}: {e}");
                    None
                }
            })
            .unwrap_or_default();
        for name in stored {
            let name = name.trim();
            if name.is_empty() {
                tracing::warn!("Dropping blank entry from {RECENT_COMMANDS_KEY}");
                continue;
            }
            tracker.push(name.to_string());
        }
        tracker
    }

    fn push(&mut self, name: String) {
        self.entries.retain(|existing| existing != &name);
        self.entries.push_back(name);
        if self.entries.len() > self.max {
            self.entries.pop_front();
        }
    }

    /// Move `name` to the most-recent end, evict the oldest entry on overflow,
    /// and persist the full list. Blank names are ignored.
    pub fn record(&mut self, name: &str, store: &mut dyn StateStore) -> Result<(), String> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        self.push(name.to_string());
        self.persist(store)
    }

    /// Empty the list in memory and in the store.
    pub fn clear(&mut self, store: &mut dyn StateStore) -> Result<(), String> {
        self.entries.clear();
        self.persist(store)
    }

    /// Most-recent-first.
    pub fn current_list(&self) -> Vec<String> {
        self.entries.iter().rev().cloned().collect()
    }

    /// Storage order (least-recent-first).
    pub fn stored_order(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self, store: &mut dyn StateStore) -> Result<(), String> {
        store
            .update(RECENT_COMMANDS_KEY, serde_json::json!(self.stored_order()))
            .map_err(|e| format!("Failed to save recent commands: {e}"))
    }
}

impl Default for RecencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;
    use serde_json::json;

    #[test]
    fn overflow_evicts_single_oldest() {
        let mut store = MemoryStore::new();
        let mut recents = RecencyTracker::new(5);
        for name in ["a", "b", "c", "d", "e", "f"] {
            recents.record(name, &mut store).unwrap();
        }
        assert_eq!(recents.len(), 5);
        assert_eq!(recents.stored_order(), vec!["b", "c", "d", "e", "f"]);
    }

    #[test]
    fn rerecording_moves_to_most_recent_without_growing() {
        let mut store = MemoryStore::new();
        let mut recents = RecencyTracker::new(5);
        for name in ["migrate", "shell", "check"] {
            recents.record(name, &mut store).unwrap();
        }
        recents.record("migrate", &mut store).unwrap();
        assert_eq!(recents.len(), 3);
        assert_eq!(recents.current_list(), vec!["migrate", "check", "shell"]);
    }

    #[test]
    fn every_record_writes_full_list() {
        let mut store = MemoryStore::new();
        let mut recents = RecencyTracker::new(3);
        recents.record("migrate", &mut store).unwrap();
        recents.record("shell", &mut store).unwrap();
        assert_eq!(store.writes, 2);
        assert_eq!(store.get(RECENT_COMMANDS_KEY), Some(json!(["migrate", "shell"])));
    }

    #[test]
    fn clear_empties_memory_and_store() {
        let mut store = MemoryStore::new();
        let mut recents = RecencyTracker::new(5);
        recents.record("migrate", &mut store).unwrap();
        recents.clear(&mut store).unwrap();
        assert!(recents.is_empty());
        assert_eq!(store.get(RECENT_COMMANDS_KEY), Some(json!([])));
    }

    #[test]
    fn load_restores_persisted_order() {
        let mut store = MemoryStore::new();
        store.update(RECENT_COMMANDS_KEY, json!(["check", "migrate"])).unwrap();
        let recents = RecencyTracker::load(&store, 5);
        assert_eq!(recents.current_list(), vec!["migrate", "check"]);
    }

    #[test]
    fn load_truncates_to_bound_keeping_newest() {
        let mut store = MemoryStore::new();
        store.update(RECENT_COMMANDS_KEY, json!(["a", "b", "c", "d"])).unwrap();
        let recents = RecencyTracker::load(&store, 2);
        assert_eq!(recents.stored_order(), vec!["c", "d"]);
    }

    #[test]
    fn load_ignores_malformed_value() {
        let mut store = MemoryStore::new();
        store.update(RECENT_COMMANDS_KEY, json!({"not": "a list"})).unwrap();
        let recents = RecencyTracker::load(&store, 5);
        assert!(recents.is_empty());
    }

    #[test]
    fn load_drops_blank_entries_and_trims_names() {
        let mut store = MemoryStore::new();
        store.update(RECENT_COMMANDS_KEY, json!(["  ", "migrate", "", " check "])).unwrap();
        let recents = RecencyTracker::load(&store, 5);
        assert_eq!(recents.current_list(), vec!["check", "migrate"]);
    }

    #[test]
    fn blank_record_is_ignored() {
        let mut store = MemoryStore::new();
        let mut recents = RecencyTracker::new(5);
        recents.record("migrate", &mut store).unwrap();
        recents.record("   ", &mut store).unwrap();
        assert_eq!(recents.current_list(), vec!["migrate"]);
        assert_eq!(store.writes, 1);
    }

    #[test]
    fn zero_bound_keeps_nothing() {
        let mut store = MemoryStore::new();
        let mut recents = RecencyTracker::new(0);
        recents.record("migrate", &mut store).unwrap();
        assert!(recents.is_empty());
    }
}
