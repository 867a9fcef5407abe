//! Role-pool scheduler: matches ready tasks to idle agents.

use std::collections::HashMap;

use tracing::debug;

use crate::agent::Agent;
use crate::error::GraphError;
use crate::task_graph::TaskGraph;

/// One agent's slot in its role's pool.
pub struct AgentSlot {
    pub agent: Agent,
    busy: bool,
    current_task: Option<String>,
}

impl AgentSlot {
    fn new(agent: Agent) -> Self {
        Self { agent, busy: false, current_task: None }
    }

    pub fn is_available(&self) -> bool {
        !self.busy
    }

    pub fn current_task(&self) -> Option<&str> {
        self.current_task.as_deref()
    }
}

/// A single pairing the scheduler produced for this round.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub task_id: String,
    pub agent_id: String,
}

/// Aggregate counts for one role's pool.
#[derive(Debug, Clone, Default)]
pub struct RoleStatus {
    pub total: usize,
    pub busy: usize,
    pub idle: usize,
}

/// Maintains a role-name -> agent-slot-list map and pairs ready tasks with
/// idle agents of the matching role, first-registered-wins on ties.
pub struct Scheduler {
    slots: HashMap<String, Vec<AgentSlot>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { slots: HashMap::new() }
    }

    pub fn register_agent(&mut self, agent: Agent) {
        let role = agent.role.as_str().to_string();
        debug!(role, agent_id = %agent.id, "Scheduler::register_agent: called");
        self.slots.entry(role).or_default().push(AgentSlot::new(agent));
    }

    /// First available slot for `role`, in registration order.
    pub fn get_available_agent(&self, role: &str) -> Option<&AgentSlot> {
        self.slots.get(role)?.iter().find(|s| s.is_available())
    }

    /// Look up a registered agent by id, regardless of role or busy state.
    pub fn get_agent(&self, agent_id: &str) -> Option<&Agent> {
        self.slots.values().flatten().find(|s| s.agent.id == agent_id).map(|s| &s.agent)
    }

    /// Flip a slot to busy outside the normal `get_assignments` pairing,
    /// for routing passes (review, merge) that pick an agent directly
    /// rather than through the TaskGraph's readiness queue.
    pub fn assign_slot(&mut self, agent_id: &str, task_id: &str) {
        for slots in self.slots.values_mut() {
            if let Some(slot) = slots.iter_mut().find(|s| s.agent.id == agent_id) {
                slot.busy = true;
                slot.current_task = Some(task_id.to_string());
                return;
            }
        }
    }

    /// Pair every ready task (priority order) with an available agent of
    /// its role; assigns the task in `graph` and flips the slot to busy.
    /// Tasks with no available agent are skipped for this round.
    pub fn get_assignments(&mut self, graph: &mut TaskGraph) -> Result<Vec<Assignment>, GraphError> {
        let ready = graph.get_ready_tasks();
        let mut assignments = Vec::new();

        for task in ready {
            let role = task.assigned_role.clone();
            let task_id = task.id.clone();

            let Some(slots) = self.slots.get_mut(&role) else { continue };
            let Some(slot) = slots.iter_mut().find(|s| s.is_available()) else { continue };

            slot.busy = true;
            slot.current_task = Some(task_id.clone());
            let agent_id = slot.agent.id.clone();

            graph.assign_agent(&task_id, &agent_id)?;
            debug!(task_id, agent_id, role, "Scheduler::get_assignments: paired");
            assignments.push(Assignment { task_id, agent_id });
        }

        Ok(assignments)
    }

    /// Clear busy/current-task on the slot owning `agent_id`; no-op if
    /// unknown.
    pub fn release_agent(&mut self, agent_id: &str) {
        debug!(agent_id, "Scheduler::release_agent: called");
        for slots in self.slots.values_mut() {
            if let Some(slot) = slots.iter_mut().find(|s| s.agent.id == agent_id) {
                slot.busy = false;
                slot.current_task = None;
                return;
            }
        }
    }

    pub fn busy_count(&self) -> usize {
        self.slots.values().flatten().filter(|s| s.busy).count()
    }

    pub fn idle_count(&self) -> usize {
        self.slots.values().flatten().filter(|s| s.is_available()).count()
    }

    pub fn status(&self) -> HashMap<String, RoleStatus> {
        self.slots
            .iter()
            .map(|(role, slots)| {
                let busy = slots.iter().filter(|s| s.busy).count();
                (role.clone(), RoleStatus { total: slots.len(), busy, idle: slots.len() - busy })
            })
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRole;
    use crate::domain::Task;

    fn dev_agent(id: &str) -> Agent {
        Agent::new(id, AgentRole::Developer, "build the kernel", 10, 0.2)
    }

    #[test]
    fn first_registered_agent_wins_when_multiple_idle() {
        let mut scheduler = Scheduler::new();
        scheduler.register_agent(dev_agent("dev-01"));
        scheduler.register_agent(dev_agent("dev-02"));

        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("t1", "boot", "developer"));

        let assignments = scheduler.get_assignments(&mut graph).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].agent_id, "dev-01");
    }

    #[test]
    fn no_available_agent_skips_the_task() {
        let mut scheduler = Scheduler::new();
        scheduler.register_agent(Agent::new("rev-01", AgentRole::Reviewer, "review diffs", 10, 0.2));

        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("t1", "boot", "developer"));

        let assignments = scheduler.get_assignments(&mut graph).unwrap();
        assert!(assignments.is_empty());
    }

    #[test]
    fn release_agent_frees_the_slot_for_reassignment() {
        let mut scheduler = Scheduler::new();
        scheduler.register_agent(dev_agent("dev-01"));

        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("t1", "boot", "developer"));
        scheduler.get_assignments(&mut graph).unwrap();
        assert_eq!(scheduler.busy_count(), 1);

        scheduler.release_agent("dev-01");
        assert_eq!(scheduler.idle_count(), 1);
    }

    #[test]
    fn assignments_are_returned_in_task_priority_order() {
        let mut scheduler = Scheduler::new();
        scheduler.register_agent(dev_agent("dev-01"));
        scheduler.register_agent(dev_agent("dev-02"));

        let mut graph = TaskGraph::new();
        graph.add_task(Task::new("low", "low priority", "developer").with_priority(5));
        graph.add_task(Task::new("high", "high priority", "developer").with_priority(1));

        let assignments = scheduler.get_assignments(&mut graph).unwrap();
        assert_eq!(assignments[0].task_id, "high");
        assert_eq!(assignments[1].task_id, "low");
    }
}
