//! Crash-recoverable global run state.
//!
//! Persisted to a single JSON file after every engine iteration so a
//! killed process can resume from the last saved phase instead of
//! restarting the whole run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// One recorded engine-level error, kept for post-mortem inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub agent_id: String,
    pub error: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Global state of an orchestration run, persisted to
/// `<workspace>/.swarm/state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub goal: String,
    #[serde(default = "default_phase")]
    pub phase: String,
    #[serde(default = "now")]
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(default = "now")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub tasks_created: u32,
    #[serde(default)]
    pub tasks_completed: u32,
    #[serde(default)]
    pub tasks_failed: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub agent_states: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    #[serde(default)]
    pub iteration: u64,
}

fn default_phase() -> String {
    "init".to_string()
}

impl RunState {
    pub fn new(run_id: impl Into<String>, goal: impl Into<String>) -> Self {
        let ts = now();
        Self {
            run_id: run_id.into(),
            goal: goal.into(),
            phase: default_phase(),
            started_at: ts,
            updated_at: ts,
            tasks_created: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            total_cost_usd: 0.0,
            agent_states: std::collections::HashMap::new(),
            errors: Vec::new(),
            iteration: 0,
        }
    }

    /// Append a failure, stamping the current time.
    pub fn record_error(&mut self, agent_id: impl Into<String>, error: impl Into<String>, task_id: Option<String>) {
        self.errors.push(ErrorRecord {
            agent_id: agent_id.into(),
            error: error.into(),
            task_id,
            timestamp: now(),
        });
    }

    /// Serialize to `path`, creating parent directories and bumping
    /// `updated_at` first.
    pub fn save(&mut self, path: &Path) -> Result<(), PersistenceError> {
        self.updated_at = now();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(|source| PersistenceError::Parse {
            kind: "run state",
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Load state previously written by `save`.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let body = std::fs::read_to_string(path)?;
        serde_json::from_str(&body).map_err(|source| PersistenceError::Parse {
            kind: "run state",
            path: path.display().to_string(),
            source,
        })
    }

    /// Load existing state at `path`, or create and persist a fresh one.
    pub fn load_or_create(path: &Path, run_id: impl Into<String>, goal: impl Into<String>) -> Result<Self, PersistenceError> {
        if path.exists() {
            return Self::load(path);
        }
        let mut state = Self::new(run_id, goal);
        state.save(path)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = RunState::new("run-1", "build a kernel");
        state.tasks_created = 7;
        state.record_error("dev-01", "compile failed", Some("task-3".to_string()));
        state.save(&path).unwrap();

        let loaded = RunState::load(&path).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.tasks_created, 7);
        assert_eq!(loaded.errors.len(), 1);
    }

    #[test]
    fn load_or_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let first = RunState::load_or_create(&path, "run-2", "goal").unwrap();
        let mut second = RunState::load_or_create(&path, "run-2", "different goal ignored").unwrap();
        second.iteration += 1;
        second.save(&path).unwrap();

        let third = RunState::load_or_create(&path, "run-2", "still ignored").unwrap();
        assert_eq!(first.goal, "goal");
        assert_eq!(third.iteration, 1);
    }
}
