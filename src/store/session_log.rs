use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use crate::{log_warn, models::SessionRecord};

use super::{read_json, write_json, KeyValueStore, SESSION_LOG_KEY};

const ENABLE_LOGS: bool = true;

/// Append-only log of completed work sessions, kept as one JSON array under
/// [`SESSION_LOG_KEY`].
#[derive(Clone)]
pub struct SessionLog {
    store: Arc<dyn KeyValueStore>,
}

impl SessionLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Every well-formed record in stored order. Entries that do not parse
    /// are skipped; a log that is not an array reads as empty. Legacy entries
    /// without an id get one, written back so it stays the same next time.
    pub fn load(&self) -> Vec<SessionRecord> {
        let mut entries = self.raw_entries();
        if backfill_ids(&mut entries) {
            if let Err(err) = write_json(self.store.as_ref(), SESSION_LOG_KEY, &entries) {
                log_warn!("Failed to persist generated session ids: {err:#}");
            }
        }
        let total = entries.len();

        let records: Vec<SessionRecord> = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<SessionRecord>(entry).ok())
            .filter(SessionRecord::is_well_formed)
            .collect();

        if records.len() < total {
            log_warn!(
                "Skipped {} malformed session log entries",
                total - records.len()
            );
        }
        records
    }

    /// Appends `record`. Existing entries are written back as they are,
    /// including ones [`load`](Self::load) skips, apart from missing ids.
    pub fn append(&self, record: &SessionRecord) -> Result<()> {
        let mut entries = self.raw_entries();
        backfill_ids(&mut entries);
        entries.push(serde_json::to_value(record)?);
        write_json(self.store.as_ref(), SESSION_LOG_KEY, &entries)
    }

    fn raw_entries(&self) -> Vec<Value> {
        match read_json(self.store.as_ref(), SESSION_LOG_KEY) {
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                log_warn!("Stored session log is not a list, treating it as empty");
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

/// Gives every object entry without an `id` a fresh one. Returns whether
/// anything changed.
fn backfill_ids(entries: &mut [Value]) -> bool {
    let mut changed = false;
    for entry in entries.iter_mut() {
        if let Value::Object(fields) = entry {
            if !fields.contains_key("id") {
                fields.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
                changed = true;
            }
        }
    }
    changed
}
