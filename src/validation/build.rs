//! Full-kernel build validation.
//!
//! Shells out to `make` in the workspace, capturing stdout/stderr/duration
//! and parsing GCC-style diagnostics out of stderr.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{BuildResult, Diagnostic};

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Drives `make` against a workspace checkout and turns its output into a
/// structured [`BuildResult`].
pub struct BuildValidator {
    workspace_path: PathBuf,
    timeout: Duration,
}

impl BuildValidator {
    pub fn new(workspace_path: impl Into<PathBuf>) -> Self {
        Self { workspace_path: workspace_path.into(), timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the default target (`make -C <workspace>`).
    pub async fn build(&self) -> BuildResult {
        self.build_target(None).await
    }

    /// Build a specific `make` target, e.g. `"test"` or `"kernel-integration"`.
    pub async fn build_target(&self, target: Option<&str>) -> BuildResult {
        debug!(target, "BuildValidator::build_target: called");

        if !self.workspace_path.join("Makefile").exists() {
            warn!("BuildValidator::build_target: no Makefile present");
            return BuildResult { success: false, stderr: "No Makefile found in workspace".to_string(), ..Default::default() };
        }

        let mut command = Command::new("make");
        command.arg("-C").arg(&self.workspace_path);
        if let Some(target) = target {
            command.arg(target);
        }

        let start = std::time::Instant::now();
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "BuildValidator::build_target: failed to spawn make");
                return BuildResult { success: false, stderr: format!("Failed to run make: {e}"), ..Default::default() };
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "BuildValidator::build_target: timed out");
                return BuildResult {
                    success: false,
                    stderr: format!("Build timed out after {}s", self.timeout.as_secs()),
                    duration_secs: self.timeout.as_secs_f64(),
                    ..Default::default()
                };
            }
        };
        let duration_secs = start.elapsed().as_secs_f64();

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();

        let errors = parse_diagnostics(&stderr, "error");
        let warnings = parse_diagnostics(&stderr, "warning");

        debug!(success, error_count = errors.len(), warning_count = warnings.len(), "BuildValidator::build_target: completed");

        BuildResult { success, stdout, stderr, duration_secs, errors, warnings }
    }
}

/// Parses GCC-style `file:line:column: level: message` diagnostics out of
/// `stderr` for the given `level` (`"error"` or `"warning"`). Lines that
/// match the level marker but not the full five-part shape still produce a
/// diagnostic with only `message` set, so nothing is silently dropped.
fn parse_diagnostics(stderr: &str, level: &str) -> Vec<Diagnostic> {
    let marker = format!("{level}:");
    let mut diagnostics = Vec::new();

    for line in stderr.lines() {
        if !line.contains(&marker) {
            continue;
        }

        let parts: Vec<&str> = line.splitn(5, ':').collect();
        if parts.len() >= 5 {
            diagnostics.push(Diagnostic {
                file: parts[0].trim().to_string(),
                line: parts[1].trim().parse().unwrap_or(0),
                column: parts[2].trim().parse().unwrap_or(0),
                message: parts[4].trim().to_string(),
            });
        } else {
            diagnostics.push(Diagnostic { message: line.trim().to_string(), ..Default::default() });
        }
    }

    diagnostics
}
