//! QEMU-based kernel test validation.
//!
//! Boots a kernel image in QEMU, captures its serial console output, and
//! parses the `[TEST] name: PASS|FAIL - reason` / `[BOOT] OK` markers
//! tests write to it.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{ArchProfile, TestCase, TestResult};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Boots a kernel image under QEMU and turns its serial output into a
/// structured [`TestResult`].
pub struct TestValidator {
    workspace_path: PathBuf,
    qemu: String,
    qemu_machine: String,
    qemu_cpu: String,
    qemu_extra: Vec<String>,
    timeout: Duration,
}

impl TestValidator {
    pub fn new(workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            qemu: "qemu-system-x86_64".to_string(),
            qemu_machine: String::new(),
            qemu_cpu: String::new(),
            qemu_extra: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Derive the QEMU invocation from a registered architecture profile.
    pub fn for_arch(workspace_path: impl Into<PathBuf>, profile: &ArchProfile) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            qemu: profile.qemu.to_string(),
            qemu_machine: profile.qemu_machine.to_string(),
            qemu_cpu: profile.qemu_cpu.to_string(),
            qemu_extra: profile.qemu_extra.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Boot `kernel_image` (default `<workspace>/build/kernel.bin`) and
    /// parse its serial output for test results.
    pub async fn run_tests(&self, kernel_image: Option<&str>) -> TestResult {
        let image = kernel_image
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.workspace_path.join("build").join("kernel.bin").to_string_lossy().to_string());

        if !std::path::Path::new(&image).exists() {
            warn!(image, "TestValidator::run_tests: kernel image not found");
            return TestResult { success: false, raw_output: format!("Kernel image not found: {image}"), ..Default::default() };
        }

        let mut command = Command::new(&self.qemu);
        if !self.qemu_machine.is_empty() {
            command.arg("-machine").arg(&self.qemu_machine);
        }
        if !self.qemu_cpu.is_empty() {
            command.arg("-cpu").arg(&self.qemu_cpu);
        }
        command
            .arg("-kernel")
            .arg(&image)
            .arg("-serial")
            .arg("stdio")
            .arg("-display")
            .arg("none")
            .arg("-no-reboot")
            .arg("-m")
            .arg("128M");
        for extra in &self.qemu_extra {
            command.arg(extra);
        }

        let start = std::time::Instant::now();
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(qemu = %self.qemu, "TestValidator::run_tests: qemu binary not found");
                return TestResult { success: false, raw_output: format!("QEMU not found: {}. Install {}.", self.qemu, self.qemu), ..Default::default() };
            }
            Ok(Err(e)) => {
                warn!(error = %e, "TestValidator::run_tests: failed to spawn qemu");
                return TestResult { success: false, raw_output: format!("Failed to run QEMU: {e}"), ..Default::default() };
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "TestValidator::run_tests: timed out, possible kernel hang");
                return TestResult {
                    success: false,
                    raw_output: format!("QEMU timed out after {}s (possible kernel hang)", self.timeout.as_secs()),
                    duration_secs: self.timeout.as_secs_f64(),
                    ..Default::default()
                };
            }
        };
        let duration_secs = start.elapsed().as_secs_f64();

        let raw_output = String::from_utf8_lossy(&output.stdout).to_string();
        let tests = parse_test_output(&raw_output);
        let boot_success = raw_output.contains("[BOOT] OK") || raw_output.to_lowercase().contains("kernel initialized");

        let passed = tests.iter().filter(|t| t.passed).count() as u32;
        let failed = tests.iter().filter(|t| !t.passed).count() as u32;
        let success = failed == 0 && (boot_success || tests.is_empty());

        debug!(total = tests.len(), passed, failed, boot_success, "TestValidator::run_tests: completed");

        TestResult { success, total: tests.len() as u32, passed, failed, tests, raw_output, boot_success, duration_secs }
    }
}

/// Parses `[TEST] name: PASS|FAIL[ - message]` markers out of serial output.
fn parse_test_output(output: &str) -> Vec<TestCase> {
    let pattern = Regex::new(r"\[TEST\]\s+(\S+):\s+(PASS|FAIL)(?:\s*-\s*(.*))?").expect("static pattern is valid");
    let mut tests = Vec::new();

    for line in output.lines() {
        if let Some(captures) = pattern.captures(line) {
            let name = captures[1].to_string();
            let passed = &captures[2] == "PASS";
            let message = captures.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
            tests.push(TestCase { name, passed, message, duration_secs: 0.0 });
        }
    }

    tests
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pass_and_fail_with_message() {
        let output = "[TEST] heap_alloc: PASS\n[TEST] page_fault: FAIL - unexpected fault at 0x1000\n[BOOT] OK\n";
        let tests = parse_test_output(output);

        assert_eq!(tests.len(), 2);
        assert!(tests[0].passed);
        assert_eq!(tests[0].name, "heap_alloc");
        assert!(!tests[1].passed);
        assert_eq!(tests[1].message, "unexpected fault at 0x1000");
    }

    #[test]
    fn ignores_unrelated_lines() {
        let tests = parse_test_output("booting...\nmemory map ok\n");
        assert!(tests.is_empty());
    }

    #[tokio::test]
    async fn missing_kernel_image_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let validator = TestValidator::new(dir.path());

        let result = validator.run_tests(None).await;
        assert!(!result.success);
        assert!(result.raw_output.contains("Kernel image not found"));
    }

    #[test]
    fn for_arch_copies_profile_fields() {
        let dir = tempfile::tempdir().unwrap();
        let profile = crate::domain::get_arch_profile("aarch64").unwrap();
        let validator = TestValidator::for_arch(dir.path(), &profile);

        assert_eq!(validator.qemu, "qemu-system-aarch64");
        assert_eq!(validator.qemu_machine, "virt");
        assert_eq!(validator.qemu_extra, vec!["-nographic"]);
    }
}
