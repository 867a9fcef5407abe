//! The run's phase machine: planning, designing, developing, integrating.
//!
//! Discrete phase methods are driven in sequence by `run`. Each phase
//! persists `RunState` before handing off to the next so a killed process
//! can be restarted from the last completed phase rather than from
//! scratch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::agent::{Agent, AgentRole};
use crate::config::{Config, WorkflowMode};
use crate::domain::{
    get_arch_profile, ArchProfile, CostTracker, Issue, ReviewRecord, RunState, Task, TaskState, Verdict,
};
use crate::error::{EngineError, GraphError};
use crate::llm::{LlmClient, LlmGateway, Message};
use crate::message_bus::MessageBus;
use crate::prompts;
use crate::scheduler::{Assignment, Scheduler};
use crate::task_graph::{create_slm_training_tasks, TaskGraph};
use crate::task_store::TaskStore;
use crate::tools::ToolContext;
use crate::validation::CompositionValidator;
use crate::workspace::Workspace;

const MANAGER_MAX_TURNS: u32 = 15;
const ARCHITECT_MAX_TURNS: u32 = 20;
const DEVELOPER_MAX_TURNS: u32 = 30;
const REVIEWER_MAX_TURNS: u32 = 15;
const TESTER_MAX_TURNS: u32 = 20;
const INTEGRATOR_MAX_TURNS: u32 = 25;
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_ITERATIONS: u32 = 200;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Drives one orchestration run from a goal to a merged, integration-
/// checked result (or a terminal error).
///
/// Manager, Architect, and Integrator are singleton agents the engine
/// invokes directly; Developer, Reviewer, and Tester are pools the
/// `Scheduler` pairs against ready tasks.
pub struct Engine {
    config: Config,
    arch_profile: ArchProfile,
    workspace: Arc<Workspace>,
    gateway: LlmGateway,
    cost_tracker: Arc<CostTracker>,
    #[allow(dead_code)]
    message_bus: MessageBus,
    task_store: TaskStore,
    graph: TaskGraph,
    scheduler: Scheduler,
    manager: Agent,
    architect: Agent,
    integrator: Agent,
    composition_validator: CompositionValidator,
    run_state: RunState,
    state_path: PathBuf,
    max_iterations: u32,
}

impl Engine {
    pub async fn new(
        config: Config,
        workspace_root: PathBuf,
        run_id: impl Into<String>,
        goal: impl Into<String>,
        llm_client: Arc<dyn LlmClient>,
    ) -> Result<Self, EngineError> {
        let run_id = run_id.into();
        let goal = goal.into();
        debug!(run_id, goal, "Engine::new: called");

        let arch_profile = get_arch_profile(&config.kernel.arch)?;

        let workspace = Arc::new(Workspace::new(workspace_root, config.workspace.branch_prefix.clone()));
        workspace.init().await?;

        let meta_root = workspace.meta_root();
        let message_bus = MessageBus::new(&meta_root)?;
        let task_store = TaskStore::new(&meta_root);

        let state_path = meta_root.join("state.json");
        let run_state = RunState::load_or_create(&state_path, &run_id, &goal)?;

        let cost_tracker = Arc::new(CostTracker::new(config.llm.cost.max_cost_usd, config.llm.cost.warn_at_usd));
        let gateway = LlmGateway::new(llm_client, config.llm.model.clone(), cost_tracker.clone());

        let mut graph = TaskGraph::new();
        for task in task_store.load_all()? {
            graph.add_task(task);
        }

        let mut scheduler = Scheduler::new();
        for i in 0..config.agents.developer_count {
            scheduler.register_agent(Self::build_agent(
                &format!("dev-{:02}", i + 1),
                AgentRole::Developer,
                prompts::developer_prompt(&arch_profile),
                DEVELOPER_MAX_TURNS,
                &config,
            ));
        }
        for i in 0..config.agents.reviewer_count {
            scheduler.register_agent(Self::build_agent(
                &format!("rev-{:02}", i + 1),
                AgentRole::Reviewer,
                prompts::reviewer_prompt(&arch_profile),
                REVIEWER_MAX_TURNS,
                &config,
            ));
        }
        for i in 0..config.agents.tester_count {
            scheduler.register_agent(Self::build_agent(
                &format!("test-{:02}", i + 1),
                AgentRole::Tester,
                prompts::tester_prompt(&arch_profile),
                TESTER_MAX_TURNS,
                &config,
            ));
        }

        let manager = Self::build_agent("manager", AgentRole::Manager, prompts::manager_prompt(&arch_profile), MANAGER_MAX_TURNS, &config);
        let architect =
            Self::build_agent("architect", AgentRole::Architect, prompts::architect_prompt(&arch_profile), ARCHITECT_MAX_TURNS, &config);
        let integrator =
            Self::build_agent("integrator", AgentRole::Integrator, prompts::integrator_prompt(&arch_profile), INTEGRATOR_MAX_TURNS, &config);

        let composition_validator = CompositionValidator::new(workspace.root());

        Ok(Self {
            config,
            arch_profile,
            workspace,
            gateway,
            cost_tracker,
            message_bus,
            task_store,
            graph,
            scheduler,
            manager,
            architect,
            integrator,
            composition_validator,
            run_state,
            state_path,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        })
    }

    fn build_agent(id: &str, role: AgentRole, system_prompt: String, max_turns: u32, config: &Config) -> Agent {
        let mut agent = Agent::new(id, role, system_prompt, max_turns, DEFAULT_TEMPERATURE);
        if let Some(model) = config.agents.models.get(role.as_str()) {
            agent = agent.with_model(model.clone());
        }
        agent
    }

    /// Run every phase to completion, persisting state throughout. On
    /// failure the run state is marked `error` and saved before the error
    /// is re-raised; on success it is marked `done`.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        debug!(run_id = %self.run_state.run_id, "Engine::run: called");
        match self.drive().await {
            Ok(()) => {
                self.set_phase("done");
                self.persist()?;
                Ok(())
            }
            Err(err) => {
                self.set_phase("error");
                self.run_state.record_error("engine", err.to_string(), None);
                let _ = self.persist();
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), EngineError> {
        self.phase_planning().await?;
        self.phase_designing().await?;
        self.phase_developing().await?;
        self.phase_integrating().await?;
        Ok(())
    }

    fn set_phase(&mut self, phase: &str) {
        debug!(phase, "Engine::set_phase: called");
        self.run_state.phase = phase.to_string();
    }

    fn persist(&mut self) -> Result<(), EngineError> {
        self.run_state.save(&self.state_path)?;
        Ok(())
    }

    fn tool_context(&self, agent_id: &str, task_id: &str) -> ToolContext {
        ToolContext::new(self.workspace.clone(), agent_id, task_id, self.arch_profile.clone())
    }

    fn final_text(history: &[Message]) -> String {
        history.iter().rev().find(|m| m.role == crate::llm::Role::Assistant).map(|m| m.text()).unwrap_or_default()
    }

    /// Ask the Manager to decompose the goal (kernel-build/dual modes)
    /// and/or install the fixed SLM pipeline (slm-training/dual modes).
    async fn phase_planning(&mut self) -> Result<(), EngineError> {
        self.set_phase("planning");
        debug!("Engine::phase_planning: called");
        let mut tasks = Vec::new();

        if matches!(self.config.workflow.mode, WorkflowMode::KernelBuild | WorkflowMode::Dual) {
            let prompt = format!("{}\n\nDecompose this goal into a task graph.", self.run_state.goal);
            let ctx = self.tool_context("manager", "planning");
            let history = vec![Message::user_text(prompt)];
            let response = self.manager.run(history, &self.gateway, &self.cost_tracker, &ctx).await?;
            let text = Self::final_text(&response);
            tasks.extend(Self::parse_tasks(&text));
        }

        if matches!(self.config.workflow.mode, WorkflowMode::SlmTraining | WorkflowMode::Dual) {
            tasks.extend(create_slm_training_tasks(&self.run_state.goal));
        }

        if tasks.is_empty() {
            return Err(EngineError::NoTasks);
        }

        self.run_state.tasks_created += tasks.len() as u32;
        for mut task in tasks {
            self.task_store.save(&mut task)?;
            self.graph.add_task(task);
        }

        self.persist()
    }

    /// One Architect design pass per distinct subsystem named across the
    /// installed tasks, producing a header under `kernel/include/`.
    async fn phase_designing(&mut self) -> Result<(), EngineError> {
        self.set_phase("designing");
        debug!("Engine::phase_designing: called");

        let mut subsystems: Vec<String> =
            self.graph.all_tasks().iter().map(|t| t.subsystem.clone()).filter(|s| s != "unknown").collect();
        subsystems.sort();
        subsystems.dedup();

        for subsystem in subsystems {
            let prompt = format!(
                "Design the interface for the '{subsystem}' subsystem. Write the header under kernel/include/{subsystem}.h \
                 and call out cross-subsystem dependencies explicitly."
            );
            let ctx = self.tool_context("architect", &format!("design-{subsystem}"));
            let history = vec![Message::user_text(prompt)];
            self.architect.run(history, &self.gateway, &self.cost_tracker, &ctx).await?;
            self.workspace.commit(&format!("architect: design {subsystem} interface"), None).await?;
        }

        self.persist()
    }

    /// Bounded iteration loop: assign ready tasks, run them, route
    /// finished work to review and approved work to merge, until the
    /// graph is complete or the iteration cap is reached.
    async fn phase_developing(&mut self) -> Result<(), EngineError> {
        self.set_phase("developing");
        debug!("Engine::phase_developing: called");

        for _ in 0..self.max_iterations {
            self.cost_tracker.check_budget().map_err(|b| EngineError::BudgetExceeded { total: b.total, cap: b.cap })?;

            if self.graph.is_complete() {
                break;
            }

            let assignments = self.scheduler.get_assignments(&mut self.graph)?;

            if assignments.is_empty() && self.scheduler.busy_count() == 0 {
                if self.graph.is_complete() {
                    break;
                }
                self.assess_progress().await?;
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                self.run_state.iteration += 1;
                self.persist()?;
                continue;
            }

            for assignment in &assignments {
                self.run_assignment(assignment).await?;
            }

            self.route_reviews().await?;
            self.route_merges().await?;
            self.route_blocked()?;

            self.run_state.iteration += 1;
            self.run_state.tasks_completed = self.graph.get_tasks_by_state(TaskState::Merged).len() as u32;
            self.run_state.tasks_failed = self.graph.get_tasks_by_state(TaskState::Failed).len() as u32;
            self.run_state.total_cost_usd = self.cost_tracker.total_cost_usd();
            self.persist()?;

            if self.graph.is_complete() {
                break;
            }
        }

        Ok(())
    }

    /// Final full-integration pass via the Integrator/`CompositionValidator`.
    async fn phase_integrating(&mut self) -> Result<(), EngineError> {
        self.set_phase("integrating");
        debug!("Engine::phase_integrating: called");
        self.workspace.checkout_main().await?;

        let result = self.composition_validator.validate(None).await;
        if !result.success {
            let issues: Vec<String> = result.issues.iter().map(|i| i.description.clone()).collect();
            self.run_state.record_error("integrator", format!("composition validation failed: {}", issues.join("; ")), None);
        }

        self.persist()
    }

    /// Create the task's branch, run the assigned agent against it, and
    /// transition the task on completion: success and the soft-timeout
    /// case both land in review; an LLM failure fails the task rather
    /// than aborting the run; a budget failure aborts.
    async fn run_assignment(&mut self, assignment: &Assignment) -> Result<(), EngineError> {
        debug!(task_id = %assignment.task_id, agent_id = %assignment.agent_id, "Engine::run_assignment: called");
        let task =
            self.graph.get_task(&assignment.task_id).cloned().ok_or_else(|| GraphError::UnknownTask(assignment.task_id.clone()))?;

        let branch = self.workspace.create_branch(&assignment.agent_id, &task.subsystem, &task.id).await?;
        if let Some(t) = self.graph.get_task_mut(&task.id) {
            t.branch = Some(branch);
        }

        let ctx = self.tool_context(&assignment.agent_id, &task.id);
        let history = vec![Message::user_text(self.task_prompt(&task))];
        let agent = self.scheduler.get_agent(&assignment.agent_id).expect("scheduler produced a valid assignment");
        self.run_state.agent_states.insert(assignment.agent_id.clone(), format!("busy:{}", task.id));
        let result = agent.run(history, &self.gateway, &self.cost_tracker, &ctx).await;

        self.workspace.checkout_main().await?;
        self.scheduler.release_agent(&assignment.agent_id);
        self.run_state.agent_states.insert(assignment.agent_id.clone(), "idle".to_string());

        match result {
            Ok(_history) => {
                self.graph.update_state(&task.id, TaskState::Review)?;
            }
            Err(crate::error::ToolLoopError::Budget(b)) => {
                return Err(EngineError::BudgetExceeded { total: b.total, cap: b.cap });
            }
            Err(crate::error::ToolLoopError::Llm(e)) => {
                warn!(task_id = %task.id, error = %e, "Engine::run_assignment: task failed");
                self.run_state.record_error(&assignment.agent_id, e.to_string(), Some(task.id.clone()));
                self.graph.update_state(&task.id, TaskState::Failed)?;
            }
        }

        if let Some(t) = self.graph.get_task_mut(&task.id) {
            self.task_store.save(t)?;
        }
        Ok(())
    }

    /// Route every task in `Review` to a free Reviewer, one at a time.
    async fn route_reviews(&mut self) -> Result<(), EngineError> {
        let review_tasks: Vec<Task> = self.graph.get_tasks_by_state(TaskState::Review).into_iter().cloned().collect();

        for task in review_tasks {
            let Some(slot) = self.scheduler.get_available_agent("reviewer") else { continue };
            let agent_id = slot.agent.id.clone();
            self.scheduler.assign_slot(&agent_id, &task.id);
            debug!(task_id = %task.id, agent_id, "Engine::route_reviews: dispatching");

            let diff = self.workspace.diff(task.branch.as_deref()).await?;
            let ctx = self.tool_context(&agent_id, &task.id);
            let history = vec![Message::user_text(self.review_prompt(&task, &diff))];
            let agent = self.scheduler.get_agent(&agent_id).expect("just assigned");
            let result = agent.run(history, &self.gateway, &self.cost_tracker, &ctx).await;
            self.scheduler.release_agent(&agent_id);

            match result {
                Ok(history) => {
                    let review = Self::parse_review(&Self::final_text(&history));
                    let next_state = match review.verdict {
                        Verdict::Approve => TaskState::Approved,
                        Verdict::RequestChanges => TaskState::Blocked,
                    };
                    if let Some(t) = self.graph.get_task_mut(&task.id) {
                        t.reviews.push(review);
                    }
                    self.graph.update_state(&task.id, next_state)?;
                }
                Err(crate::error::ToolLoopError::Budget(b)) => {
                    return Err(EngineError::BudgetExceeded { total: b.total, cap: b.cap });
                }
                Err(crate::error::ToolLoopError::Llm(e)) => {
                    self.run_state.record_error(&agent_id, e.to_string(), Some(task.id.clone()));
                    self.graph.update_state(&task.id, TaskState::Blocked)?;
                }
            }

            if let Some(t) = self.graph.get_task_mut(&task.id) {
                self.task_store.save(t)?;
            }
        }
        Ok(())
    }

    /// Route every `Approved` task through the Integrator; a clean merge
    /// (branch fully absorbed into main) lands on `Merged`, anything else
    /// on `Blocked` with the conflict left for a human or a later pass
    /// (re-emitting an automatic fix task is not implemented here).
    async fn route_merges(&mut self) -> Result<(), EngineError> {
        let approved: Vec<Task> = self.graph.get_tasks_by_state(TaskState::Approved).into_iter().cloned().collect();

        for task in approved {
            let Some(branch) = task.branch.clone() else { continue };
            debug!(task_id = %task.id, branch, "Engine::route_merges: dispatching");

            self.workspace.checkout_main().await?;
            let integrator_id = self.integrator.id.clone();
            let ctx = self.tool_context(&integrator_id, &task.id);
            let history = vec![Message::user_text(self.merge_prompt(&task))];
            let result = self.integrator.run(history, &self.gateway, &self.cost_tracker, &ctx).await;
            self.workspace.checkout_main().await?;

            match result {
                Ok(_) => {
                    let statuses = self.workspace.get_branch_status().await?;
                    let merged_cleanly = statuses.get(&branch).map(|s| s.ahead == 0).unwrap_or(true);
                    let next_state = if merged_cleanly { TaskState::Merged } else { TaskState::Blocked };
                    self.graph.update_state(&task.id, next_state)?;
                }
                Err(crate::error::ToolLoopError::Budget(b)) => {
                    return Err(EngineError::BudgetExceeded { total: b.total, cap: b.cap });
                }
                Err(crate::error::ToolLoopError::Llm(e)) => {
                    self.run_state.record_error("integrator", e.to_string(), Some(task.id.clone()));
                    self.graph.update_state(&task.id, TaskState::Blocked)?;
                }
            }

            if let Some(t) = self.graph.get_task_mut(&task.id) {
                self.task_store.save(t)?;
            }
        }
        Ok(())
    }

    /// Re-offer every `Blocked` task to the scheduler: per Open Question
    /// 1 (see DESIGN.md), a rejected review or a conflicted merge is
    /// treated as immediately repaired rather than spawning a synthetic
    /// fix task, so the task just goes back through `Ready` and picks up
    /// a (possibly different) agent of its role on the next assignment
    /// pass. Clearing `assigned_agent_id` avoids the task looking still
    /// claimed by the slot that released it.
    fn route_blocked(&mut self) -> Result<(), EngineError> {
        let blocked: Vec<String> = self.graph.get_tasks_by_state(TaskState::Blocked).iter().map(|t| t.id.clone()).collect();
        for task_id in blocked {
            if let Some(t) = self.graph.get_task_mut(&task_id) {
                t.assigned_agent_id = None;
            }
            self.graph.update_state(&task_id, TaskState::Ready)?;
            debug!(task_id, "Engine::route_blocked: re-readied");
            if let Some(t) = self.graph.get_task_mut(&task_id) {
                self.task_store.save(t)?;
            }
        }
        Ok(())
    }

    /// Solicit a Manager status read when an iteration produced no
    /// assignments and no agent is busy, so a stalled run surfaces a
    /// diagnosis rather than spinning silently.
    async fn assess_progress(&mut self) -> Result<(), EngineError> {
        debug!("Engine::assess_progress: called");
        let progress = self.graph.progress();
        let branch_status = self.workspace.get_branch_status().await?;
        let branch_summary: Vec<String> = branch_status.iter().map(|(b, s)| format!("{b}: {} commits ahead of main", s.ahead)).collect();

        let summary = format!(
            "Task state counts: {progress:?}\nBranch status:\n{}\n\n\
             Assess whether the run is making progress or is stuck, and suggest what should change.",
            branch_summary.join("\n")
        );

        let manager_id = self.manager.id.clone();
        let ctx = self.tool_context(&manager_id, "progress-assessment");
        let history = vec![Message::user_text(summary)];
        match self.manager.run(history, &self.gateway, &self.cost_tracker, &ctx).await {
            Ok(history) => {
                debug!(assessment = %Self::final_text(&history), "Engine::assess_progress: manager reported");
            }
            Err(crate::error::ToolLoopError::Budget(b)) => {
                return Err(EngineError::BudgetExceeded { total: b.total, cap: b.cap });
            }
            Err(crate::error::ToolLoopError::Llm(e)) => {
                self.run_state.record_error("manager", e.to_string(), None);
            }
        }
        Ok(())
    }

    fn task_prompt(&self, task: &Task) -> String {
        let criteria = task.acceptance_criteria.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n");
        let spec_line = task.spec_reference.as_deref().map(|r| format!("\nSpec reference: {r}")).unwrap_or_default();
        format!(
            "Task: {}\nSubsystem: {}\nDescription: {}\nAcceptance criteria:\n{criteria}{spec_line}",
            task.title, task.subsystem, task.description
        )
    }

    fn review_prompt(&self, task: &Task, diff: &str) -> String {
        format!(
            "Review the changes for task '{}' on branch {}.\n\nDiff:\n{diff}\n\n\
             Respond with a JSON object: {{\"verdict\": \"approve\"|\"request_changes\", \"summary\": \"...\", \
             \"issues\": [{{\"severity\": \"...\", \"file\": \"...\", \"line\": 0, \"description\": \"...\"}}]}}",
            task.title,
            task.branch.as_deref().unwrap_or("unknown")
        )
    }

    fn merge_prompt(&self, task: &Task) -> String {
        format!(
            "Merge the approved branch {} for task '{}' into main. Check out main, review the diff, merge cleanly, \
             resolve any trivial conflicts yourself, then build and run the tests to confirm nothing regressed.",
            task.branch.as_deref().unwrap_or("unknown"),
            task.title
        )
    }

    /// Extract the manager's task-list JSON by bracket-finding rather than
    /// requiring the whole reply to be valid JSON (the model often wraps
    /// it in prose). Returns an empty list on any parse failure.
    fn parse_tasks(text: &str) -> Vec<Task> {
        let Some(start) = text.find('[') else { return Vec::new() };
        let Some(end) = text.rfind(']') else { return Vec::new() };
        if end < start {
            return Vec::new();
        }

        let specs: Vec<ManagerTaskSpec> = match serde_json::from_str(&text[start..=end]) {
            Ok(specs) => specs,
            Err(e) => {
                warn!(error = %e, "Engine::parse_tasks: manager reply did not parse as a task array");
                return Vec::new();
            }
        };

        specs
            .into_iter()
            .map(|spec| {
                let mut task = Task::new(spec.task_id, spec.title, spec.assigned_to)
                    .with_dependencies(spec.dependencies)
                    .with_priority(spec.priority);
                task.subsystem = spec.subsystem.unwrap_or_else(|| "unknown".to_string());
                task.spec_reference = spec.spec_reference;
                task.acceptance_criteria = spec.acceptance_criteria;
                task.description = spec.description;
                task
            })
            .collect()
    }

    /// Same bracket-finding strategy for a reviewer's `{...}` verdict
    /// object; falls back to a request-changes verdict summarizing the
    /// unparsed text rather than dropping the review entirely.
    fn parse_review(text: &str) -> ReviewRecord {
        let parsed = text.find('{').zip(text.rfind('}')).and_then(|(start, end)| {
            if end < start {
                return None;
            }
            serde_json::from_str::<ReviewSpec>(&text[start..=end]).ok()
        });

        match parsed {
            Some(spec) => {
                let verdict = if spec.verdict.eq_ignore_ascii_case("approve") { Verdict::Approve } else { Verdict::RequestChanges };
                let issues = spec
                    .issues
                    .into_iter()
                    .map(|i| Issue { severity: i.severity, description: format!("{}:{} {}", i.file, i.line, i.description) })
                    .collect();
                ReviewRecord { verdict, summary: spec.summary, issues }
            }
            None => {
                let truncated: String = text.chars().take(500).collect();
                ReviewRecord { verdict: Verdict::RequestChanges, summary: format!("Could not parse structured review. Raw output: {truncated}"), issues: Vec::new() }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManagerTaskSpec {
    task_id: String,
    title: String,
    #[serde(default)]
    subsystem: Option<String>,
    assigned_to: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default)]
    spec_reference: Option<String>,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
    #[serde(default)]
    description: String,
}

fn default_priority() -> i32 {
    3
}

#[derive(Debug, Deserialize)]
struct ReviewSpec {
    verdict: String,
    summary: String,
    #[serde(default)]
    issues: Vec<IssueSpec>,
}

#[derive(Debug, Deserialize)]
struct IssueSpec {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: i64,
    description: String,
}
