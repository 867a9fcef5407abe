//! Composition validation: detects subsystems that pass in isolation but
//! fail once combined.
//!
//! Builds the full kernel, runs the unit test image, then runs an
//! integration image, and flags the case where units pass but the
//! integration run does not.

use std::path::PathBuf;

use tracing::info;

use super::{BuildValidator, TestValidator};

/// Severity of a single composition finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// One finding raised while comparing isolated and combined test runs.
#[derive(Debug, Clone)]
pub struct CompositionIssue {
    pub subsystems: Vec<String>,
    pub severity: Severity,
    pub description: String,
    pub evidence: String,
}

/// Outcome of a full composition validation pass.
#[derive(Debug, Clone, Default)]
pub struct CompositionResult {
    pub success: bool,
    pub issues: Vec<CompositionIssue>,
    pub build_ok: bool,
    pub unit_tests_ok: bool,
    pub integration_tests_ok: bool,
    pub summary: String,
}

/// Runs a build, a unit-test pass, and an integration-test pass, and
/// compares them for the "Frankenstein effect": subsystems that are each
/// individually correct but misbehave once composed.
pub struct CompositionValidator {
    workspace_path: PathBuf,
    build_validator: BuildValidator,
    test_validator: TestValidator,
}

impl CompositionValidator {
    pub fn new(workspace_path: impl Into<PathBuf>) -> Self {
        let workspace_path = workspace_path.into();
        Self {
            build_validator: BuildValidator::new(&workspace_path),
            test_validator: TestValidator::new(&workspace_path),
            workspace_path,
        }
    }

    pub async fn validate(&self, subsystems: Option<Vec<String>>) -> CompositionResult {
        let subsystems = subsystems.unwrap_or_else(|| vec!["unknown".to_string()]);

        info!("CompositionValidator::validate: building full kernel");
        let build_result = self.build_validator.build().await;
        if !build_result.success {
            let truncated: String = build_result.stderr.chars().take(500).collect();
            return CompositionResult { success: false, build_ok: false, summary: format!("Build failed: {truncated}"), ..Default::default() };
        }

        info!("CompositionValidator::validate: running unit tests");
        let unit_result = self.test_validator.run_tests(None).await;

        info!("CompositionValidator::validate: running integration tests");
        let integration_image = self.workspace_path.join("build").join("kernel-integration.bin");
        let integration_result = self.test_validator.run_tests(Some(&integration_image.to_string_lossy())).await;

        let mut issues = Vec::new();

        if unit_result.success && !integration_result.success {
            let evidence: String = integration_result.raw_output.chars().take(500).collect();
            issues.push(CompositionIssue {
                subsystems: subsystems.clone(),
                severity: Severity::Critical,
                description: "Frankenstein effect detected: unit tests pass but integration tests fail. \
                    Subsystems work individually but fail when composed."
                    .to_string(),
                evidence,
            });
        }

        let unit_passed_names: std::collections::HashSet<&str> =
            unit_result.tests.iter().filter(|t| t.passed).map(|t| t.name.as_str()).collect();
        for test in &integration_result.tests {
            if !test.passed && unit_passed_names.contains(test.name.as_str()) {
                issues.push(CompositionIssue {
                    subsystems: subsystems.clone(),
                    severity: Severity::Warning,
                    description: format!("Test '{}' passes in isolation but fails in integration", test.name),
                    evidence: test.message.clone(),
                });
            }
        }

        let success = !issues.iter().any(|i| i.severity == Severity::Critical);
        let summary = if issues.is_empty() { "No composition issues".to_string() } else { format!("{} composition issues found", issues.len()) };

        CompositionResult {
            success,
            build_ok: build_result.success,
            unit_tests_ok: unit_result.success,
            integration_tests_ok: integration_result.success,
            issues,
            summary,
        }
    }
}
