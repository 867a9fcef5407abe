//! JSON-file persistence for `Task` records.
//!
//! Tasks are persisted directly as one JSON file per id under the
//! workspace's metadata subtree, keyed by task id.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::Task;
use crate::error::PersistenceError;

/// Persists `Task` records under `<meta>/tasks/<task_id>.json`.
#[derive(Debug, Clone)]
pub struct TaskStore {
    root: PathBuf,
}

impl TaskStore {
    pub fn new(meta_root: impl Into<PathBuf>) -> Self {
        Self { root: meta_root.into().join("tasks") }
    }

    fn path_for(&self, task_id: &str) -> PathBuf {
        self.root.join(format!("{task_id}.json"))
    }

    /// Write `task` to disk, refreshing its `updated_at` timestamp first.
    pub fn save(&self, task: &mut Task) -> Result<(), PersistenceError> {
        task.updated_at = chrono::Utc::now();
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(&task.id);
        let body = serde_json::to_string_pretty(task).map_err(|source| PersistenceError::Parse {
            kind: "task",
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(&path, body)?;
        debug!(task_id = %task.id, "task persisted");
        Ok(())
    }

    pub fn load(&self, task_id: &str) -> Result<Task, PersistenceError> {
        let path = self.path_for(task_id);
        let body = std::fs::read_to_string(&path)?;
        serde_json::from_str(&body).map_err(|source| PersistenceError::Parse {
            kind: "task",
            path: path.display().to_string(),
            source,
        })
    }

    /// Load every task on disk, sorted by `created_at`.
    pub fn load_all(&self) -> Result<Vec<Task>, PersistenceError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut tasks = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            tasks.push(Self::load_from_path(&path)?);
        }
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    fn load_from_path(path: &Path) -> Result<Task, PersistenceError> {
        let body = std::fs::read_to_string(path)?;
        serde_json::from_str(&body).map_err(|source| PersistenceError::Parse {
            kind: "task",
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = TaskStore::new(dir.path());

        let mut task = Task::new("a", "Do the thing", "developer");
        store.save(&mut task).unwrap();

        let loaded = store.load("a").unwrap();
        assert_eq!(loaded.id, "a");
        assert_eq!(loaded.title, "Do the thing");
    }

    #[test]
    fn load_all_sorted_by_created_at() {
        let dir = tempdir().unwrap();
        let store = TaskStore::new(dir.path());

        let mut first = Task::new("a", "First", "developer");
        store.save(&mut first).unwrap();

        let mut second = Task::new("b", "Second", "developer");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        store.save(&mut second).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a");
        assert_eq!(all[1].id, "b");
    }

    #[test]
    fn load_all_on_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("nonexistent"));
        assert!(store.load_all().unwrap().is_empty());
    }
}
