//! CLI command definitions and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// taskswarm - multi-agent build orchestrator
#[derive(Parser)]
#[command(
    name = "taskswarm",
    about = "Orchestrates a team of LLM agents building an OS kernel or a small language model",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Workspace root directory (overrides the config file's workspace.path)
    #[arg(short, long, global = true, help = "Workspace root directory")]
    pub workspace: Option<PathBuf>,

    /// Directory of subsystem spec documents to seed into <workspace>/specs
    #[arg(short, long, global = true, help = "Directory of spec documents to seed into the workspace")]
    pub spec: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start or resume a run toward the given goal
    Run {
        /// Natural-language description of what the agent team should build
        goal: String,
    },

    /// Print the current run's phase, progress counts, cost, and recent errors
    Status,

    /// List registered agents and their role/idle-busy state
    Agents,

    /// List tasks and their current state
    Tasks,
}
