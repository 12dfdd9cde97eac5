//! Workflow lifecycle state and its transitions

use crate::api::{ExecuteResponse, TemplateBundle};
use crate::layout::{diagnose, layout_tasks};
use crate::plan::{
    Plan, Step, StepResult, StepStatus, TaskNode, TemplateSummary, ToolSchema, ToolSummary,
    referenced_step,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Where the workflow is in its plan -> edit -> execute lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Planning,
    Editing,
    Executing,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::Planning => "planning",
            WorkflowStatus::Editing => "editing",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    /// Waiting on the remote service
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkflowStatus::Planning | WorkflowStatus::Executing)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive the workflow state
///
/// Response-carrying events hold the `epoch` of the request that produced
/// them; a mismatch means the request was superseded or reset.
#[derive(Debug, Clone)]
pub enum WorkflowAction {
    SetGoal(String),
    StartPlanning,
    StartTemplate {
        template_id: String,
    },
    PlanReceived {
        epoch: u64,
        plan: Plan,
    },
    TemplateReceived {
        epoch: u64,
        bundle: TemplateBundle,
    },
    PlanError {
        epoch: u64,
        error: String,
    },
    UpdateTaskParam {
        step_id: String,
        param: String,
        value: Value,
    },
    RemoveTask {
        step_id: String,
    },
    AddTask {
        tool: ToolSummary,
    },
    StartExecution,
    ExecutionResult {
        epoch: u64,
        response: ExecuteResponse,
    },
    ExecutionError {
        epoch: u64,
        error: String,
    },
    SelectTask(Option<String>),
    CatalogLoaded(Vec<ToolSummary>),
    TemplatesLoaded(Vec<TemplateSummary>),
    ToolSchemaLoaded(ToolSchema),
    Reset,
}

impl WorkflowAction {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowAction::SetGoal(_) => "set_goal",
            WorkflowAction::StartPlanning => "start_planning",
            WorkflowAction::StartTemplate { .. } => "start_template",
            WorkflowAction::PlanReceived { .. } => "plan_received",
            WorkflowAction::TemplateReceived { .. } => "template_received",
            WorkflowAction::PlanError { .. } => "plan_error",
            WorkflowAction::UpdateTaskParam { .. } => "update_task_param",
            WorkflowAction::RemoveTask { .. } => "remove_task",
            WorkflowAction::AddTask { .. } => "add_task",
            WorkflowAction::StartExecution => "start_execution",
            WorkflowAction::ExecutionResult { .. } => "execution_result",
            WorkflowAction::ExecutionError { .. } => "execution_error",
            WorkflowAction::SelectTask(_) => "select_task",
            WorkflowAction::CatalogLoaded(_) => "catalog_loaded",
            WorkflowAction::TemplatesLoaded(_) => "templates_loaded",
            WorkflowAction::ToolSchemaLoaded(_) => "tool_schema_loaded",
            WorkflowAction::Reset => "reset",
        }
    }
}

/// Outcome of reducing one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Not valid in the current state; nothing changed
    Ignored { reason: String },
}

impl Transition {
    fn ignored(reason: impl Into<String>) -> Self {
        Transition::Ignored {
            reason: reason.into(),
        }
    }

    #[cfg(test)]
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Complete client-side workflow state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub status: WorkflowStatus,

    /// Natural-language goal
    #[serde(default)]
    pub goal: String,

    #[serde(default)]
    pub plan: Option<Plan>,

    /// Laid-out plan steps with live status
    #[serde(default)]
    pub tasks: Vec<TaskNode>,

    /// Raw results from the last execution or template
    #[serde(default)]
    pub step_results: Vec<StepResult>,

    /// Selected step id
    #[serde(default)]
    pub selected: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub total_credits: Option<f64>,

    #[serde(default)]
    pub total_duration_ms: Option<u64>,

    /// Cached tool catalog (survives reset)
    #[serde(default)]
    pub tools: Vec<ToolSummary>,

    /// Cached template list (survives reset)
    #[serde(default)]
    pub templates: Vec<TemplateSummary>,

    /// Detailed schemas fetched so far, by tool id (survives reset)
    #[serde(default)]
    pub tool_schemas: BTreeMap<String, ToolSchema>,

    /// Bumped whenever an outstanding response must be discarded
    #[serde(default)]
    pub epoch: u64,
}

/// Per-status task counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self, step_id: &str) -> Option<&TaskNode> {
        self.tasks.iter().find(|t| t.id() == step_id)
    }

    pub fn selected_task(&self) -> Option<&TaskNode> {
        self.selected.as_deref().and_then(|id| self.task(id))
    }

    pub fn tool(&self, tool_id: &str) -> Option<&ToolSummary> {
        self.tools.iter().find(|t| t.id == tool_id)
    }

    /// Estimated credits of the current plan
    pub fn estimated_credits(&self) -> f64 {
        self.plan.as_ref().map(|p| p.estimated_credits).unwrap_or(0.0)
    }

    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in &self.tasks {
            match task.status {
                StepStatus::Pending => counts.pending += 1,
                StepStatus::Running => counts.running += 1,
                StepStatus::Completed => counts.completed += 1,
                StepStatus::Failed => counts.failed += 1,
                StepStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    /// Apply an action
    pub fn reduce(&mut self, action: WorkflowAction) -> Transition {
        let name = action.name();
        let from = self.status;
        let transition = self.apply(action);

        match transition {
            Transition::Applied => {
                tracing::debug!(action = name, from = %from, to = %self.status, "Workflow transition");
            }
            Transition::Ignored { ref reason } => {
                tracing::debug!(action = name, status = %from, reason = %reason, "Workflow action ignored");
            }
        }

        transition
    }

    fn apply(&mut self, action: WorkflowAction) -> Transition {
        use WorkflowAction as A;
        use WorkflowStatus as S;

        match action {
            A::SetGoal(goal) => {
                if self.status.is_transient() {
                    return Transition::ignored("cannot change goal while busy");
                }
                self.goal = goal;
            }

            A::StartPlanning => {
                if self.status == S::Executing {
                    return Transition::ignored("execution in progress");
                }
                if self.goal.trim().is_empty() {
                    return Transition::ignored("goal is empty");
                }
                self.begin_planning();
            }

            A::StartTemplate { template_id } => {
                if self.status.is_transient() {
                    return Transition::ignored("request in progress");
                }
                tracing::info!(template = %template_id, "Loading template");
                self.begin_planning();
            }

            A::PlanReceived { epoch, plan } => {
                if let Some(t) = self.check_response(epoch, S::Planning) {
                    return t;
                }
                self.install_plan(plan);
            }

            A::TemplateReceived { epoch, bundle } => {
                if let Some(t) = self.check_response(epoch, S::Planning) {
                    return t;
                }
                if self.goal.trim().is_empty() {
                    self.goal = bundle.plan.goal.clone();
                }
                self.install_plan(bundle.plan);
                merge_results(&mut self.tasks, &bundle.step_results, StepStatus::Pending);
                self.step_results = bundle.step_results;
                self.total_credits = bundle.total_credits;
            }

            A::PlanError { epoch, error } => {
                if let Some(t) = self.check_response(epoch, S::Planning) {
                    return t;
                }
                tracing::warn!(error = %error, "Planning failed");
                self.status = S::Idle;
                self.error = Some(error);
            }

            A::UpdateTaskParam {
                step_id,
                param,
                value,
            } => {
                if self.status != S::Editing {
                    return Transition::ignored("tasks can only be edited while editing");
                }
                let Some(task) = self.tasks.iter_mut().find(|t| t.id() == step_id) else {
                    return Transition::ignored(format!("unknown task '{}'", step_id));
                };
                task.step.params.insert(param.clone(), value.clone());
                if let Some(step) = self.plan.as_mut().and_then(|p| p.step_mut(&step_id)) {
                    step.params.insert(param, value);
                }
            }

            A::RemoveTask { step_id } => {
                if self.status != S::Editing {
                    return Transition::ignored("tasks can only be removed while editing");
                }
                let Some(plan) = self.plan.as_mut() else {
                    return Transition::ignored("no plan");
                };
                let Some(index) = plan.steps.iter().position(|s| s.id == step_id) else {
                    return Transition::ignored(format!("unknown task '{}'", step_id));
                };

                let removed = plan.steps.remove(index);
                let cost = self
                    .tools
                    .iter()
                    .find(|t| t.id == removed.tool_id)
                    .map(|t| t.credit_cost)
                    .unwrap_or(0.0);
                plan.estimated_credits = (plan.estimated_credits - cost).max(0.0);

                let dependents: Vec<&str> = plan
                    .steps
                    .iter()
                    .filter(|s| references(s, &step_id))
                    .map(|s| s.id.as_str())
                    .collect();
                if !dependents.is_empty() {
                    tracing::warn!(
                        step = %step_id,
                        dependents = ?dependents,
                        "Removed step is still referenced"
                    );
                }

                if self.selected.as_deref() == Some(step_id.as_str()) {
                    self.selected = None;
                }
                self.relayout();
            }

            A::AddTask { tool } => {
                if !matches!(self.status, S::Editing | S::Idle) {
                    return Transition::ignored("tasks can only be added while idle or editing");
                }
                let goal = self.goal.clone();
                let plan = self.plan.get_or_insert_with(|| Plan::new(goal, Vec::new()));
                let id = next_step_id(plan);

                let mut step = Step::new(id.clone(), tool.id.clone())
                    .with_tool_name(tool.name.clone())
                    .with_description(tool.description.clone());
                seed_defaults(&mut step, tool.input_schema.as_ref());

                plan.steps.push(step);
                plan.estimated_credits += tool.credit_cost;
                tracing::info!(step = %id, tool = %tool.id, "Added task");

                self.status = S::Editing;
                self.relayout();
            }

            A::StartExecution => {
                if self.status != S::Editing {
                    return Transition::ignored("execution can only start from editing");
                }
                if self.tasks.is_empty() {
                    return Transition::ignored("plan has no tasks");
                }
                for task in &mut self.tasks {
                    task.clear_outcome(StepStatus::Running);
                }
                self.step_results.clear();
                self.total_credits = None;
                self.total_duration_ms = None;
                self.error = None;
                self.epoch += 1;
                self.status = S::Executing;
            }

            A::ExecutionResult { epoch, response } => {
                if let Some(t) = self.check_response(epoch, S::Executing) {
                    return t;
                }
                let results = response.step_results.unwrap_or_default();
                merge_results(&mut self.tasks, &results, StepStatus::Pending);

                self.step_results = results;
                self.total_credits = response.total_credits;
                self.total_duration_ms = response.total_duration_ms;
                if response.success {
                    self.status = S::Completed;
                    self.error = None;
                } else {
                    self.status = S::Failed;
                    self.error = Some(
                        response
                            .error
                            .unwrap_or_else(|| "workflow execution failed".into()),
                    );
                }
            }

            A::ExecutionError { epoch, error } => {
                if let Some(t) = self.check_response(epoch, S::Executing) {
                    return t;
                }
                tracing::warn!(error = %error, "Execution failed");
                self.status = S::Failed;
                self.error = Some(error);
            }

            A::SelectTask(step_id) => {
                if let Some(ref id) = step_id {
                    if self.task(id).is_none() {
                        return Transition::ignored(format!("unknown task '{}'", id));
                    }
                }
                self.selected = step_id;
            }

            A::CatalogLoaded(tools) => self.tools = tools,

            A::TemplatesLoaded(templates) => self.templates = templates,

            A::ToolSchemaLoaded(schema) => {
                self.tool_schemas.insert(schema.id.clone(), schema);
            }

            A::Reset => {
                *self = Self {
                    tools: std::mem::take(&mut self.tools),
                    templates: std::mem::take(&mut self.templates),
                    tool_schemas: std::mem::take(&mut self.tool_schemas),
                    epoch: self.epoch + 1,
                    ..Self::default()
                };
            }
        }

        Transition::Applied
    }

    /// Stale or out-of-place responses are dropped
    fn check_response(&self, epoch: u64, expected: WorkflowStatus) -> Option<Transition> {
        if epoch != self.epoch {
            return Some(Transition::ignored(format!(
                "stale response (epoch {} != {})",
                epoch, self.epoch
            )));
        }
        if self.status != expected {
            return Some(Transition::ignored(format!("not {}", expected)));
        }
        None
    }

    fn begin_planning(&mut self) {
        self.plan = None;
        self.tasks.clear();
        self.step_results.clear();
        self.selected = None;
        self.error = None;
        self.total_credits = None;
        self.total_duration_ms = None;
        self.epoch += 1;
        self.status = WorkflowStatus::Planning;
    }

    fn install_plan(&mut self, plan: Plan) {
        for diagnostic in diagnose(&plan.steps) {
            tracing::warn!(%diagnostic, "Plan diagnostic");
        }
        tracing::info!(
            steps = plan.steps.len(),
            credits = plan.estimated_credits,
            "Plan received"
        );
        self.tasks = layout_tasks(&plan.steps);
        self.plan = Some(plan);
        self.status = WorkflowStatus::Editing;
    }

    /// Re-lay out the plan, carrying each surviving task's outcome over
    fn relayout(&mut self) {
        let steps = self.plan.as_ref().map(|p| p.steps.as_slice()).unwrap_or(&[]);
        let mut previous: HashMap<String, TaskNode> = std::mem::take(&mut self.tasks)
            .into_iter()
            .map(|t| (t.step.id.clone(), t))
            .collect();

        self.tasks = layout_tasks(steps);
        for task in &mut self.tasks {
            if let Some(old) = previous.remove(task.id()) {
                task.status = old.status;
                task.result = old.result;
                task.error = old.error;
                task.duration_ms = old.duration_ms;
            }
        }
    }
}

/// Apply results by step id; tasks without one fall back to `unmatched`
fn merge_results(tasks: &mut [TaskNode], results: &[StepResult], unmatched: StepStatus) {
    let by_id: HashMap<&str, &StepResult> =
        results.iter().map(|r| (r.step_id.as_str(), r)).collect();

    for task in tasks {
        match by_id.get(task.id()) {
            Some(result) => task.apply_result(result),
            None => task.clear_outcome(unmatched),
        }
    }
}

fn references(step: &Step, target: &str) -> bool {
    step.dependencies
        .as_ref()
        .map(|deps| deps.values().any(|r| referenced_step(r) == Some(target)))
        .unwrap_or(false)
}

/// First free `step<N>` id, starting after the current step count
fn next_step_id(plan: &Plan) -> String {
    let mut n = plan.steps.len() + 1;
    loop {
        let id = format!("step{}", n);
        if !plan.contains(&id) {
            return id;
        }
        n += 1;
    }
}

/// Fill params from `default` values in a JSON-schema-like input description
fn seed_defaults(step: &mut Step, schema: Option<&Value>) {
    let Some(properties) = schema
        .and_then(|s| s.get("properties"))
        .and_then(|p| p.as_object())
    else {
        return;
    };
    for (name, property) in properties {
        if let Some(default) = property.get("default") {
            step.params.insert(name.clone(), default.clone());
        }
    }
}
