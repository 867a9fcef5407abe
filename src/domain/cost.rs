//! Per-agent cost accounting and budget enforcement.
//!
//! Usage is kept as a two-part shape (raw token counts, accumulated
//! dollar cost) rather than a single opaque number so validators and
//! tests can reason about token counts independent of a pricing table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::warn;

/// Raised by `CostTracker::check_budget` once aggregate spend reaches the
/// hard cap. Terminal for the whole run.
#[derive(Debug, Error)]
#[error("total cost ${total:.2} exceeds budget ${cap:.2}")]
pub struct BudgetExceeded {
    pub total: f64,
    pub cap: f64,
}

/// Per-agent accumulator of input/output token counts and dollar cost.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CostUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost_usd: f64,
}

impl CostUsage {
    /// Record one gateway call's usage against this agent.
    pub fn add(&mut self, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        self.total_cost_usd += cost_usd;
    }
}

/// Aggregates `CostUsage` across every agent in the run and enforces the
/// soft-warn / hard-stop budget.
#[derive(Debug)]
pub struct CostTracker {
    max_cost_usd: f64,
    warn_at_usd: f64,
    agent_usage: std::sync::Mutex<HashMap<String, CostUsage>>,
    warned: AtomicBool,
}

impl CostTracker {
    pub fn new(max_cost_usd: f64, warn_at_usd: f64) -> Self {
        Self {
            max_cost_usd,
            warn_at_usd,
            agent_usage: std::sync::Mutex::new(HashMap::new()),
            warned: AtomicBool::new(false),
        }
    }

    /// Sum of every agent's `total_cost_usd`.
    pub fn total_cost_usd(&self) -> f64 {
        self.agent_usage.lock().expect("cost tracker mutex poisoned").values().map(|u| u.total_cost_usd).sum()
    }

    /// Record usage for a specific agent; creates its entry on first use.
    pub fn record(&self, agent_id: &str, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        let mut guard = self.agent_usage.lock().expect("cost tracker mutex poisoned");
        guard.entry(agent_id.to_string()).or_default().add(input_tokens, output_tokens, cost_usd);
    }

    /// A copy of one agent's current usage (zeroed if never recorded).
    pub fn usage_for(&self, agent_id: &str) -> CostUsage {
        self.agent_usage.lock().expect("cost tracker mutex poisoned").get(agent_id).cloned().unwrap_or_default()
    }

    /// Raises once total cost passes the hard cap; logs a one-shot warning
    /// the first time total cost crosses the soft cap.
    pub fn check_budget(&self) -> Result<(), BudgetExceeded> {
        let total = self.total_cost_usd();
        if total >= self.max_cost_usd {
            return Err(BudgetExceeded { total, cap: self.max_cost_usd });
        }
        if total >= self.warn_at_usd && !self.warned.swap(true, Ordering::SeqCst) {
            warn!(total, cap = self.max_cost_usd, "cost warning: soft budget crossed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_monotonicity_and_aggregate() {
        let tracker = CostTracker::new(50.0, 25.0);
        tracker.record("dev-01", 100, 50, 1.0);
        tracker.record("dev-01", 10, 5, 0.1);
        tracker.record("dev-02", 200, 100, 2.0);

        let dev01 = tracker.usage_for("dev-01");
        assert_eq!(dev01.input_tokens, 110);
        assert!((dev01.total_cost_usd - 1.1).abs() < 1e-9);
        assert!((tracker.total_cost_usd() - 3.1).abs() < 1e-9);
    }

    #[test]
    fn budget_gate_fires_exactly_at_cap() {
        let tracker = CostTracker::new(5.0, 2.0);
        tracker.record("dev-01", 0, 0, 4.9);
        assert!(tracker.check_budget().is_ok());
        tracker.record("dev-01", 0, 0, 0.1);
        assert!(tracker.check_budget().is_err());
    }
}
