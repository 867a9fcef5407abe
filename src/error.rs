//! Top-level error types shared across the orchestration core.

use thiserror::Error;

/// Errors raised by the task graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("cycle detected in task graph, involved tasks: {0:?}")]
    CycleDetected(Vec<String>),

    #[error("illegal state transition for task {task_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        task_id: String,
        from: crate::domain::task::TaskState,
        to: crate::domain::task::TaskState,
    },
}

/// Errors raised by the versioned workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("git command failed: {0}")]
    GitFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Errors raised by the message bus / task store persistence layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {kind} at {path}: {source}")]
    Parse {
        kind: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by tool execution. Caught at the ToolLoop boundary and
/// turned into a string the model can react to; never propagated raw.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Errors that abort a ToolLoop turn outright rather than being handed
/// back to the model as a tool result: only budget exhaustion propagates
/// past the loop, everything else becomes a ToolResult.
#[derive(Debug, Error)]
pub enum ToolLoopError {
    #[error(transparent)]
    Budget(#[from] crate::domain::cost::BudgetExceeded),

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),
}

/// Terminal errors for an orchestration run. Everything else is surfaced as
/// a typed, non-terminal result (BuildResult, TestResult, review verdicts).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("budget exceeded: total cost ${total:.2} >= cap ${cap:.2}")]
    BudgetExceeded { total: f64, cap: f64 },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    ToolLoop(#[from] ToolLoopError),

    #[error(transparent)]
    Arch(#[from] crate::domain::arch::UnknownArch),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("manager produced no tasks")]
    NoTasks,

    #[error("unknown workflow mode: {0}")]
    UnknownWorkflowMode(String),
}
