//! Persistent key-value state shared across invocations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{load_json_config, save_json_config, STATE_FILE};
use crate::host::StateStore;

/// Key of the recently-used command list.
pub const RECENT_COMMANDS_KEY: &str = "recentCommands";
/// Key of the cached catalog for the last fetched entry point.
pub const CATALOG_CACHE_KEY: &str = "catalogCache";

/// [`StateStore`] backed by a single JSON object file. The whole object is
/// rewritten atomically on every update.
pub struct JsonFileStore {
    dir: PathBuf,
    values: BTreeMap<String, serde_json::Value>,
}

impl JsonFileStore {
    /// Open the store in `dir`, reading the current file once.
    pub fn open(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            values: load_json_config(dir, STATE_FILE),
        }
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).cloned()
    }

    fn update(&mut self, key: &str, value: serde_json::Value) -> Result<(), String> {
        self.values.insert(key.to_string(), value);
        save_json_config(&self.dir, STATE_FILE, &self.values)
    }
}

/// In-memory [`StateStore`]; nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, serde_json::Value>,
    /// Number of `update` calls, for callers that need to observe writes.
    pub writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).cloned()
    }

    fn update(&mut self, key: &str, value: serde_json::Value) -> Result<(), String> {
        self.writes += 1;
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}
