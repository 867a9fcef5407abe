//! Configuration types and loading.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub agents: AgentsConfig,
    pub kernel: KernelConfig,
    pub workspace: WorkspaceConfig,
    pub workflow: WorkflowConfig,
}

impl Config {
    /// Load configuration with the fallback chain: explicit path,
    /// project-local `.taskswarm.yml`, XDG user config, built-in defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".taskswarm.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskswarm").join("taskswarm.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("no config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("failed to parse config file")?;
        tracing::info!("loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolve the API key for a provider by reading the environment
    /// variable named in `llm.api_keys`, falling back to `ANTHROPIC_API_KEY`
    /// if the provider has no explicit entry.
    pub fn resolve_api_key(&self, provider: &str) -> Result<String> {
        let env_var = self.llm.api_keys.get(provider).cloned().unwrap_or_else(|| "ANTHROPIC_API_KEY".to_string());
        std::env::var(&env_var).with_context(|| format!("missing API key: environment variable {env_var} is not set"))
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// provider -> environment variable name holding its API key
    #[serde(rename = "api-keys")]
    pub api_keys: HashMap<String, String>,

    /// provider -> base URL
    pub endpoints: HashMap<String, String>,

    pub cost: CostConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut api_keys = HashMap::new();
        api_keys.insert("anthropic".to_string(), "ANTHROPIC_API_KEY".to_string());

        let mut endpoints = HashMap::new();
        endpoints.insert("anthropic".to_string(), "https://api.anthropic.com".to_string());

        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            api_keys,
            endpoints,
            cost: CostConfig::default(),
        }
    }
}

/// Budget thresholds enforced by the cost tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    #[serde(rename = "max-cost-usd")]
    pub max_cost_usd: f64,

    #[serde(rename = "warn-at-usd")]
    pub warn_at_usd: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self { max_cost_usd: 50.0, warn_at_usd: 35.0 }
    }
}

/// Agent pool sizing and per-role model overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    #[serde(rename = "developer-count")]
    pub developer_count: u32,

    #[serde(rename = "reviewer-count")]
    pub reviewer_count: u32,

    #[serde(rename = "tester-count")]
    pub tester_count: u32,

    #[serde(rename = "training-agent-count")]
    pub training_agent_count: u32,

    /// role -> model override
    pub models: HashMap<String, String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            developer_count: 3,
            reviewer_count: 1,
            tester_count: 1,
            training_agent_count: 0,
            models: HashMap::new(),
        }
    }
}

/// Target architecture selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub arch: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self { arch: "x86_64".to_string() }
    }
}

/// Versioned workspace location and branch naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub path: PathBuf,

    #[serde(rename = "branch-prefix")]
    pub branch_prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("."), branch_prefix: "swarm".to_string() }
    }
}

/// Which task template the engine seeds on a fresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    KernelBuild,
    SlmTraining,
    Dual,
}

impl std::str::FromStr for WorkflowMode {
    type Err = crate::error::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kernel_build" => Ok(WorkflowMode::KernelBuild),
            "slm_training" => Ok(WorkflowMode::SlmTraining),
            "dual" => Ok(WorkflowMode::Dual),
            other => Err(crate::error::EngineError::UnknownWorkflowMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub mode: WorkflowMode,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { mode: WorkflowMode::KernelBuild }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.kernel.arch, "x86_64");
        assert_eq!(config.agents.developer_count, 3);
        assert_eq!(config.workflow.mode, WorkflowMode::KernelBuild);
        assert_eq!(config.llm.cost.max_cost_usd, 50.0);
    }

    #[test]
    fn deserialize_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: claude-opus-4

agents:
  developer-count: 5
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "claude-opus-4");
        assert_eq!(config.agents.developer_count, 5);
        assert_eq!(config.agents.reviewer_count, 1);
        assert_eq!(config.kernel.arch, "x86_64");
    }

    #[test]
    fn workflow_mode_parses_closed_set() {
        assert_eq!("dual".parse::<WorkflowMode>().unwrap(), WorkflowMode::Dual);
        assert!("bogus".parse::<WorkflowMode>().is_err());
    }
}
