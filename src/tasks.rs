//! Persisted to-do list kept next to the timer.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::TaskError,
    log_info, log_warn,
    models::{Task, TaskFilter},
    store::{write_json, KeyValueStore, TASKS_KEY},
};

const ENABLE_LOGS: bool = true;

/// View of the `tasks` key. Every mutation rereads the key first and is
/// written back before it returns, so several lists over one store agree.
pub struct TaskList {
    store: Arc<dyn KeyValueStore>,
    tasks: Vec<Task>,
}

impl TaskList {
    /// Reads the stored list. Entries that do not parse are dropped; legacy
    /// entries without an id get one and the list is written back so the id
    /// sticks. A store that cannot be read yields an empty list.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let mut list = Self {
            store,
            tasks: Vec::new(),
        };
        if let Err(err) = list.refresh() {
            log_warn!("Failed to read tasks, starting empty: {err:#}");
        }
        list
    }

    /// Replaces the in-memory view with what is stored now, so a mutation
    /// never writes back a stale copy over changes made through another list.
    fn refresh(&mut self) -> anyhow::Result<()> {
        let entries = match self.store.get(TASKS_KEY)? {
            Some(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Array(entries)) => entries,
                Ok(_) | Err(_) => {
                    log_warn!("Stored tasks are not a list, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let missing_ids = entries.iter().any(|entry| entry.get("id").is_none());
        let total = entries.len();
        self.tasks = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<Task>(entry).ok())
            .collect();

        if self.tasks.len() < total {
            log_warn!("Dropped {} unreadable tasks", total - self.tasks.len());
        }
        if missing_ids {
            if let Err(err) = self.flush() {
                log_warn!("Failed to persist generated task ids: {err}");
            }
        }
        Ok(())
    }

    pub fn add(&mut self, text: &str) -> Result<Task, TaskError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TaskError::EmptyText);
        }

        self.refresh()?;
        let task = Task::new(text);
        self.tasks.push(task.clone());
        self.flush()?;
        log_info!("Added task {}", task.id);
        Ok(task)
    }

    /// Flips completion and returns the new value.
    pub fn toggle(&mut self, id: Uuid) -> Result<bool, TaskError> {
        self.refresh()?;
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(TaskError::NotFound(id))?;
        task.completed = !task.completed;
        let completed = task.completed;

        self.flush()?;
        Ok(completed)
    }

    pub fn remove(&mut self, id: Uuid) -> Result<Task, TaskError> {
        self.refresh()?;
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(TaskError::NotFound(id))?;
        let removed = self.tasks.remove(index);

        self.flush()?;
        Ok(removed)
    }

    /// Tasks in insertion order.
    pub fn list(&self, filter: TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|task| filter.matches(task)).collect()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.completed).count()
    }

    fn flush(&self) -> Result<(), TaskError> {
        write_json(self.store.as_ref(), TASKS_KEY, &self.tasks)?;
        Ok(())
    }
}
