//! Task domain type and its associated state machine, review, build and
//! test result shapes.

use serde::{Deserialize, Serialize};

/// One state in a task's lifecycle. Terminal states are `Merged` and
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    Ready,
    Running,
    Review,
    Approved,
    Merged,
    Blocked,
    Failed,
}

impl TaskState {
    /// True for the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Merged | TaskState::Failed)
    }

    /// Whether `self -> next` is a transition the state machine allows.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Pending, Ready) => true,
            (Ready, Running) => true,
            (Running, Review) | (Running, Failed) | (Running, Blocked) => true,
            (Review, Approved) | (Review, Blocked) => true,
            (Approved, Merged) => true,
            (Blocked, Ready) => true,
            // any non-terminal state may be forced to Blocked by the engine
            (s, Blocked) if !s.is_terminal() => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Review => "review",
            TaskState::Approved => "approved",
            TaskState::Merged => "merged",
            TaskState::Blocked => "blocked",
            TaskState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The verdict a reviewer attaches to a review record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    RequestChanges,
}

/// A single reviewer comment tied to a review pass. Carried from the
/// original's structured issue lists (`reviewer_agent.py`) rather than a
/// flat string, since `CompositionValidator` and the engine's review
/// routing both consume individual issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub severity: String,
    pub description: String,
}

/// An append-only review record attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub verdict: Verdict,
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// A single compiler diagnostic (error or warning).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// The result of invoking the build entry point.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildResult {
    pub success: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
    #[serde(default)]
    pub warnings: Vec<Diagnostic>,
}

/// A single named test outcome parsed from emulator serial output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub duration_secs: f64,
}

/// The result of booting the emulator and parsing its test markers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestResult {
    pub success: bool,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub passed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub tests: Vec<TestCase>,
    #[serde(default)]
    pub raw_output: String,
    #[serde(default)]
    pub boot_success: bool,
    #[serde(default)]
    pub duration_secs: f64,
}

/// A unit of work tracked by the `TaskGraph` and persisted by the
/// `TaskStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub subsystem: String,
    pub assigned_role: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub spec_reference: Option<String>,
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub build_status: Option<BuildResult>,
    #[serde(default)]
    pub test_status: Option<TestResult>,
    #[serde(default)]
    pub reviews: Vec<ReviewRecord>,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default = "chrono::Utc::now")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

fn default_priority() -> i32 {
    3
}

impl Task {
    /// Construct a minimal task ready to be inserted into a `TaskGraph`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, assigned_role: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            subsystem: "unknown".to_string(),
            assigned_role: assigned_role.into(),
            dependencies: Vec::new(),
            priority: default_priority(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            spec_reference: None,
            state: TaskState::Pending,
            assigned_agent_id: None,
            branch: None,
            build_status: None,
            test_status: None,
            reviews: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert!(TaskState::Pending.can_transition_to(TaskState::Ready));
        assert!(TaskState::Ready.can_transition_to(TaskState::Running));
        assert!(TaskState::Running.can_transition_to(TaskState::Review));
        assert!(TaskState::Review.can_transition_to(TaskState::Approved));
        assert!(TaskState::Approved.can_transition_to(TaskState::Merged));
        assert!(TaskState::Blocked.can_transition_to(TaskState::Ready));
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(!TaskState::Pending.can_transition_to(TaskState::Merged));
        assert!(!TaskState::Merged.can_transition_to(TaskState::Running));
        assert!(!TaskState::Failed.can_transition_to(TaskState::Ready));
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Merged.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn new_task_defaults_to_pending() {
        let task = Task::new("a", "Do the thing", "developer");
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.priority, 3);
        assert!(task.dependencies.is_empty());
    }
}
