//! taskswarm - a multi-agent build orchestrator.
//!
//! taskswarm points a team of LLM-backed agents at a single goal - build
//! an OS kernel for a target architecture, train a small language model,
//! or both - and drives them through planning, design, implementation,
//! review, and integration until the goal's task graph is fully merged
//! or the run's cost budget is exhausted.
//!
//! # Core concepts
//!
//! - **Task graph**: work is decomposed into a DAG of tasks; a task
//!   becomes ready only once every dependency has merged.
//! - **Role pools**: Developer, Reviewer, and Tester agents are sized
//!   pools matched against ready tasks by the [`scheduler`]; Manager,
//!   Architect, and Integrator are run as singletons by the [`engine`].
//! - **State in files**: task records, messages, and run state persist
//!   as JSON under `<workspace>/.swarm`; source changes persist in git.
//! - **Composition checking**: the [`validation`] module re-validates
//!   the merged whole, not just each task in isolation, to catch
//!   regressions invisible at the single-task level.
//!
//! # Modules
//!
//! - [`cli`] - command-line interface
//! - [`config`] - configuration types and loading
//! - [`domain`] - shared data types (tasks, messages, cost, run state, architecture profiles)
//! - [`engine`] - the run's phase machine
//! - [`llm`] - LLM client trait, gateway, and the Anthropic implementation
//! - [`message_bus`] - file-backed inter-agent mailboxes
//! - [`prompts`] - per-role system prompt builders
//! - [`scheduler`] - role-pool task assignment
//! - [`task_graph`] - in-memory DAG with cascading readiness
//! - [`task_store`] - per-task JSON persistence
//! - [`tool_loop`] - the agentic tool-use loop
//! - [`tools`] - the tool catalog agents call into
//! - [`validation`] - build, test, and composition validators
//! - [`workspace`] - the git-backed versioned workspace

pub mod agent;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod llm;
pub mod message_bus;
pub mod prompts;
pub mod scheduler;
pub mod task_graph;
pub mod task_store;
pub mod tool_loop;
pub mod tools;
pub mod validation;
pub mod workspace;

pub use agent::{Agent, AgentRole};
pub use config::Config;
pub use domain::{ArchProfile, CostTracker, Message, MessageType, RunState, Task, TaskState};
pub use engine::Engine;
pub use error::EngineError;
pub use llm::{AnthropicClient, LlmClient, LlmGateway};
pub use message_bus::MessageBus;
pub use scheduler::Scheduler;
pub use task_graph::TaskGraph;
pub use task_store::TaskStore;
pub use tool_loop::ToolLoop;
pub use tools::{Tool, ToolContext, ToolExecutor, ToolResult};
pub use validation::{BuildValidator, CompositionValidator, TestValidator};
pub use workspace::Workspace;
