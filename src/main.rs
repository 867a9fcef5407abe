//! taskswarm - multi-agent build orchestrator.
//!
//! CLI entry point: loads configuration, resolves credentials, and drives
//! an `Engine` run to completion (or reports the on-disk run/task state
//! for the inspection subcommands).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;
use uuid::Uuid;

use taskswarm::cli::{Cli, Command};
use taskswarm::config::Config;
use taskswarm::domain::RunState;
use taskswarm::llm::{AnthropicClient, ProviderConfig};
use taskswarm::task_store::TaskStore;
use taskswarm::{Engine, LlmClient};

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_HISTORY_LINES: usize = 5;

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    let workspace_root = cli.workspace.clone().unwrap_or_else(|| config.workspace.path.clone());

    let exit_code = match cli.command {
        Command::Run { goal } => run_command(config, workspace_root, cli.spec.as_deref(), goal).await,
        Command::Status => status_command(&workspace_root),
        Command::Agents => agents_command(&config),
        Command::Tasks => tasks_command(&workspace_root),
    };

    std::process::exit(exit_code);
}

/// Seed configuration, credentials, and a fresh `Engine`, then drive the
/// run to completion. Returns the process exit code.
async fn run_command(config: Config, workspace_root: PathBuf, spec_dir: Option<&Path>, goal: String) -> i32 {
    info!(goal, workspace = %workspace_root.display(), "taskswarm run: starting");

    let provider = provider_of(&config.llm.model);
    let api_key = match config.resolve_api_key(provider) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("missing API key: {e:#}");
            return 1;
        }
    };

    // Build the provider-routing table the gateway's request contract
    // describes, even though today's only concrete client is Anthropic's -
    // the lookup still picks up a configured endpoint override.
    let mut provider_config = ProviderConfig::default();
    provider_config.api_keys.insert(provider.to_string(), api_key);
    for (provider_name, endpoint) in &config.llm.endpoints {
        provider_config.endpoints.insert(provider_name.clone(), endpoint.clone());
    }
    let api_key = provider_config.api_key_for(&config.llm.model).expect("just inserted above").to_string();
    let base_url = provider_config.base_url_for(&config.llm.model).unwrap_or("https://api.anthropic.com").to_string();

    let client = match AnthropicClient::new(config.llm.model.clone(), api_key, base_url, config.llm.max_tokens, DEFAULT_LLM_TIMEOUT) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("failed to construct LLM client: {e}");
            return 1;
        }
    };
    let llm_client: Arc<dyn LlmClient> = Arc::new(client);

    if let Some(spec_dir) = spec_dir {
        if let Err(e) = seed_specs(&workspace_root, spec_dir).await {
            eprintln!("failed to seed spec documents: {e:#}");
            return 1;
        }
    }

    let run_id = Uuid::new_v4().simple().to_string()[..12].to_string();
    let mut engine = match Engine::new(config, workspace_root, run_id, goal, llm_client).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to initialize engine: {e}");
            return 1;
        }
    };

    match engine.run().await {
        Ok(()) => {
            println!("run complete");
            0
        }
        Err(e) => {
            eprintln!("run failed: {e}");
            1
        }
    }
}

/// Copy every file under `spec_dir` into `<workspace>/specs/`, preserving
/// relative structure, so `read_spec` can resolve them during the run.
async fn seed_specs(workspace_root: &Path, spec_dir: &Path) -> Result<()> {
    let dest_root = workspace_root.join("specs");
    tokio::fs::create_dir_all(&dest_root).await.context("failed to create specs directory")?;

    for entry in walkdir::WalkDir::new(spec_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(spec_dir).context("spec file outside spec directory")?;
        let dest = dest_root.join(relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(entry.path(), &dest).await.with_context(|| format!("failed to copy {}", entry.path().display()))?;
    }
    Ok(())
}

/// Print the current run's phase, progress counters, cost, and the last
/// few recorded errors.
fn status_command(workspace_root: &Path) -> i32 {
    let state_path = workspace_root.join(".swarm").join("state.json");
    let run_state = match RunState::load(&state_path) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("no run state at {}: {e}", state_path.display());
            return 1;
        }
    };

    println!("run:     {}", run_state.run_id);
    println!("goal:    {}", run_state.goal);
    println!("phase:   {}", run_state.phase);
    println!("tasks:   {} created, {} completed, {} failed", run_state.tasks_created, run_state.tasks_completed, run_state.tasks_failed);
    println!("cost:    ${:.2}", run_state.total_cost_usd);
    println!("iteration: {}", run_state.iteration);

    if !run_state.errors.is_empty() {
        println!("\nlast {} error(s):", ERROR_HISTORY_LINES.min(run_state.errors.len()));
        for record in run_state.errors.iter().rev().take(ERROR_HISTORY_LINES) {
            println!("  [{}] {}: {}", record.timestamp, record.agent_id, record.error);
        }
    }
    0
}

/// List the configured agent pools. Per-agent live busy/idle state is
/// only known to a running `Engine`, so this reports the static pool
/// sizing a `run` would instantiate.
fn agents_command(config: &Config) -> i32 {
    println!("manager:    1");
    println!("architect:  1");
    println!("integrator: 1");
    println!("developer:  {}", config.agents.developer_count);
    println!("reviewer:   {}", config.agents.reviewer_count);
    println!("tester:     {}", config.agents.tester_count);
    0
}

/// List every persisted task and its current state.
fn tasks_command(workspace_root: &Path) -> i32 {
    let meta_root = workspace_root.join(".swarm");
    let store = TaskStore::new(meta_root);
    let tasks = match store.load_all() {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("failed to load tasks: {e}");
            return 1;
        }
    };

    if tasks.is_empty() {
        println!("(no tasks)");
        return 0;
    }
    for task in tasks {
        println!("{:<24} {:<10} {:<12} {}", task.id, task.state, task.assigned_role, task.title);
    }
    0
}

fn provider_of(model: &str) -> &str {
    model.split('/').next().unwrap_or(model)
}
