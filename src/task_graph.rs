//! In-memory DAG of tasks with dependency tracking and cascading
//! readiness.
//!
//! Task data lives in the `domain::Task` records; this type owns only
//! the index structures (id -> task, task -> dependents) and the
//! readiness and topological-order algorithms.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::domain::{Task, TaskState};
use crate::error::GraphError;

/// Directed acyclic graph of tasks, keyed by task id.
#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: HashMap<String, Task>,
    dependents: HashMap<String, HashSet<String>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, record its reverse-dependency edges, and evaluate
    /// its own readiness.
    pub fn add_task(&mut self, task: Task) -> &Task {
        let id = task.id.clone();
        for dep_id in &task.dependencies {
            self.dependents.entry(dep_id.clone()).or_default().insert(id.clone());
        }
        self.nodes.insert(id.clone(), task);
        self.update_readiness(&id);
        self.nodes.get(&id).expect("just inserted")
    }

    /// Bulk insert; readiness is re-evaluated for every task after the
    /// whole batch lands so intra-batch dependencies resolve regardless
    /// of insertion order.
    pub fn add_tasks(&mut self, tasks: Vec<Task>) {
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        for task in tasks {
            let id = task.id.clone();
            for dep_id in &task.dependencies {
                self.dependents.entry(dep_id.clone()).or_default().insert(id.clone());
            }
            self.nodes.insert(id, task);
        }
        for id in &ids {
            self.update_readiness(id);
        }
    }

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.nodes.get(task_id)
    }

    /// Direct mutable access for attaching review/build/test records that
    /// don't themselves drive a state transition.
    pub fn get_task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.nodes.get_mut(task_id)
    }

    pub fn all_tasks(&self) -> Vec<&Task> {
        self.nodes.values().collect()
    }

    /// Set a task's state; when transitioning to `Merged`, cascade a
    /// readiness check to every direct dependent.
    pub fn update_state(&mut self, task_id: &str, new_state: TaskState) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(task_id).ok_or_else(|| GraphError::UnknownTask(task_id.to_string()))?;
        let old_state = node.state;
        if !old_state.can_transition_to(new_state) {
            return Err(GraphError::IllegalTransition { task_id: task_id.to_string(), from: old_state, to: new_state });
        }
        node.state = new_state;
        node.updated_at = chrono::Utc::now();
        debug!(task_id, ?old_state, ?new_state, "task state transition");

        if new_state == TaskState::Merged {
            if let Some(dependents) = self.dependents.get(task_id).cloned() {
                for dep_id in dependents {
                    self.update_readiness(&dep_id);
                }
            }
        }
        Ok(())
    }

    /// Record which agent is working on a task and transition it to
    /// `Running`.
    pub fn assign_agent(&mut self, task_id: &str, agent_id: &str) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(task_id).ok_or_else(|| GraphError::UnknownTask(task_id.to_string()))?;
        if !node.state.can_transition_to(TaskState::Running) {
            return Err(GraphError::IllegalTransition { task_id: task_id.to_string(), from: node.state, to: TaskState::Running });
        }
        node.assigned_agent_id = Some(agent_id.to_string());
        node.state = TaskState::Running;
        node.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Every task in `Ready`, sorted by ascending priority (lower value
    /// first).
    pub fn get_ready_tasks(&self) -> Vec<&Task> {
        let mut ready: Vec<&Task> = self.nodes.values().filter(|t| t.state == TaskState::Ready).collect();
        ready.sort_by_key(|t| t.priority);
        ready
    }

    pub fn get_tasks_by_state(&self, state: TaskState) -> Vec<&Task> {
        self.nodes.values().filter(|t| t.state == state).collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.values().all(|t| t.is_terminal())
    }

    /// Count of tasks in each state, keyed by the state's display form.
    pub fn progress(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for task in self.nodes.values() {
            *counts.entry(task.state.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Kahn's algorithm; fails with `CycleDetected` naming every task
    /// that never reached in-degree zero.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for node in self.nodes.values() {
            for dep in &node.dependencies {
                if in_degree.contains_key(dep.as_str()) {
                    *in_degree.get_mut(node.id.as_str()).expect("node id present") += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = in_degree.iter().filter(|(_, &deg)| deg == 0).map(|(id, _)| *id).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            if let Some(dependents) = self.dependents.get(id) {
                for dependent_id in dependents {
                    if let Some(deg) = in_degree.get_mut(dependent_id.as_str()) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push_back(dependent_id.as_str());
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let done: HashSet<&str> = order.iter().map(|s| s.as_str()).collect();
            let missing: Vec<String> = self.nodes.keys().filter(|id| !done.contains(id.as_str())).cloned().collect();
            return Err(GraphError::CycleDetected(missing));
        }
        Ok(order)
    }

    /// A pending task becomes ready once every dependency id is known and
    /// merged. An unknown or non-merged dependency leaves it pending; a
    /// failed dependency never unblocks it.
    fn update_readiness(&mut self, task_id: &str) {
        let Some(node) = self.nodes.get(task_id) else { return };
        if node.state != TaskState::Pending {
            return;
        }
        let all_met = node.dependencies.iter().all(|dep_id| matches!(self.nodes.get(dep_id), Some(dep) if dep.state == TaskState::Merged));
        if all_met {
            let node = self.nodes.get_mut(task_id).expect("checked above");
            node.state = TaskState::Ready;
            node.updated_at = chrono::Utc::now();
        }
    }
}

/// Emit the fixed seven-task small-language-model training pipeline:
/// data prep and architecture design in parallel, then train, evaluate,
/// quantize, export, and integrate in sequence.
pub fn create_slm_training_tasks(_goal: &str) -> Vec<Task> {
    vec![
        Task::new("slm-data-prep", "Prepare SLM training dataset", "data_scientist").with_priority(1),
        Task::new("slm-arch-design", "Design SLM architecture", "model_architect").with_priority(1),
        Task::new("slm-training", "Train SLM model", "training")
            .with_dependencies(vec!["slm-data-prep".to_string(), "slm-arch-design".to_string()])
            .with_priority(2),
        Task::new("slm-evaluation", "Evaluate trained model", "training")
            .with_dependencies(vec!["slm-training".to_string()])
            .with_priority(3),
        Task::new("slm-quantization", "Quantize SLM to INT4", "training")
            .with_dependencies(vec!["slm-evaluation".to_string()])
            .with_priority(4),
        Task::new("slm-export", "Export SLM to GGUF", "training")
            .with_dependencies(vec!["slm-quantization".to_string()])
            .with_priority(5),
        Task::new("slm-integration", "Integrate SLM into kernel", "integrator")
            .with_dependencies(vec!["slm-export".to_string()])
            .with_priority(6),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_cascades_on_merge() {
        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("a", "A", "developer"));
        graph.add_task(Task::new("b", "B", "developer").with_dependencies(vec!["a".to_string()]));

        assert_eq!(graph.get_tasks_by_state(TaskState::Ready).len(), 1);
        assert!(graph.get_task("b").unwrap().state == TaskState::Pending);

        graph.update_state("a", TaskState::Ready).unwrap();
        graph.update_state("a", TaskState::Running).unwrap();
        graph.update_state("a", TaskState::Review).unwrap();
        graph.update_state("a", TaskState::Approved).unwrap();
        graph.update_state("a", TaskState::Merged).unwrap();

        assert_eq!(graph.get_task("b").unwrap().state, TaskState::Ready);
    }

    #[test]
    fn failed_dependency_never_unblocks() {
        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("a", "A", "developer"));
        graph.add_task(Task::new("b", "B", "developer").with_dependencies(vec!["a".to_string()]));

        graph.update_state("a", TaskState::Ready).unwrap();
        graph.update_state("a", TaskState::Running).unwrap();
        graph.update_state("a", TaskState::Failed).unwrap();

        assert_eq!(graph.get_task("b").unwrap().state, TaskState::Pending);
    }

    #[test]
    fn ready_tasks_sorted_by_priority() {
        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("low", "Low priority", "developer").with_priority(5));
        graph.add_task(Task::new("high", "High priority", "developer").with_priority(1));

        let ready = graph.get_ready_tasks();
        assert_eq!(ready[0].id, "high");
        assert_eq!(ready[1].id, "low");
    }

    #[test]
    fn topological_order_detects_cycle() {
        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("a", "A", "developer").with_dependencies(vec!["b".to_string()]));
        graph.add_task(Task::new("b", "B", "developer").with_dependencies(vec!["a".to_string()]));

        let err = graph.topological_order().unwrap_err();
        match err {
            GraphError::CycleDetected(ids) => {
                assert_eq!(ids.len(), 2);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let mut graph = TaskGraph::new();
        graph.add_tasks(vec![
            Task::new("c", "C", "developer").with_dependencies(vec!["a".to_string(), "b".to_string()]),
            Task::new("a", "A", "developer"),
            Task::new("b", "B", "developer").with_dependencies(vec!["a".to_string()]),
        ]);

        let order = graph.topological_order().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn slm_pipeline_has_expected_dependency_chain() {
        let tasks = create_slm_training_tasks("build a tiny model");
        assert_eq!(tasks.len(), 7);

        let mut graph = TaskGraph::new();
        graph.add_tasks(tasks);
        assert_eq!(graph.get_tasks_by_state(TaskState::Ready).len(), 2);
        assert_eq!(graph.get_task("slm-training").unwrap().dependencies.len(), 2);
    }

    #[test]
    fn is_complete_requires_every_task_terminal() {
        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("a", "A", "developer"));
        assert!(!graph.is_complete());

        graph.update_state("a", TaskState::Ready).unwrap();
        graph.update_state("a", TaskState::Running).unwrap();
        graph.update_state("a", TaskState::Failed).unwrap();
        assert!(graph.is_complete());
    }
}
