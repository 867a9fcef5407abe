//! Domain types shared across the orchestration core.
//!
//! These are plain data types serialized to JSON for the on-disk metadata
//! layout (`<workspace>/.swarm/tasks`, `<workspace>/.swarm/messages`,
//! `<workspace>/.swarm/state.json`). Behavior lives in the owning
//! components (`TaskGraph`, `MessageBus`, `Engine`); these types are the
//! persisted shape.

pub mod arch;
pub mod cost;
pub mod message;
pub mod run_state;
pub mod task;

pub use arch::{ArchProfile, get_arch_profile, list_architectures};
pub use cost::{CostTracker, CostUsage};
pub use message::{Message, MessageType};
pub use run_state::RunState;
pub use task::{BuildResult, Diagnostic, Issue, ReviewRecord, Task, TaskState, TestCase, TestResult, Verdict};
