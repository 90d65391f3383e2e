//! Key/value persistence.
//!
//! Every key is read and written independently; there are no cross-key
//! transactions. Readers treat any failure as "absent" and fall back to a
//! default, see [`read_json`].

mod migrations;
pub mod session_log;
mod sqlite;

use std::{collections::HashMap, sync::RwLock};

use anyhow::{anyhow, Result};
use serde_json::Value;

pub use session_log::SessionLog;
pub use sqlite::SqliteStore;

use crate::log_warn;

const ENABLE_LOGS: bool = true;

pub const SETTINGS_KEY: &str = "settings";
pub const SESSION_LOG_KEY: &str = "sessionLog";
pub const TASKS_KEY: &str = "tasks";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Reads `key` as JSON. Storage errors and unparsable bytes are logged and
/// reported as `None` so callers can substitute their default.
pub fn read_json(store: &dyn KeyValueStore, key: &str) -> Option<Value> {
    let bytes = match store.get(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(err) => {
            log_warn!("Failed to read '{key}' from store, using defaults: {err:#}");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            log_warn!("Stored '{key}' is not valid JSON, using defaults: {err}");
            None
        }
    }
}

pub fn write_json<T: serde::Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, &bytes)
}

/// Volatile store for tests and hosts that do not need durability.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let guard = self
            .entries
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        guard.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
