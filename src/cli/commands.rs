//! CLI command implementations

use super::output::{OutputEvent, OutputHandler};
use crate::layout::{connectors, diagnose, layout_tasks};
use crate::plan::{Plan, StepStatus, TaskNode};
use crate::store::SessionStore;
use crate::workflow::{SessionError, WorkflowSession, WorkflowState, WorkflowStatus};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// A parameter override given as `STEP.PARAM=VALUE`
#[derive(Debug, Clone, PartialEq)]
pub struct ParamOverride {
    pub step: String,
    pub param: String,
    pub value: Value,
}

/// Parse `--set` arguments
///
/// Values that parse as JSON are taken as JSON, anything else is a string.
pub fn parse_overrides(args: &[String]) -> Result<Vec<ParamOverride>> {
    let mut parsed = Vec::new();

    for arg in args {
        let (target, raw) = arg
            .split_once('=')
            .with_context(|| format!("expected STEP.PARAM=VALUE, got '{}'", arg))?;
        let (step, param) = target
            .split_once('.')
            .filter(|(s, p)| !s.is_empty() && !p.is_empty())
            .with_context(|| format!("expected STEP.PARAM before '=', got '{}'", target))?;
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        parsed.push(ParamOverride {
            step: step.to_string(),
            param: param.to_string(),
            value,
        });
    }

    Ok(parsed)
}

/// Edits applied to an editable plan
#[derive(Debug, Clone, Default)]
pub struct PlanEdits {
    /// Steps to remove
    pub remove: Vec<String>,
    /// Catalog tools to append as new steps
    pub add: Vec<String>,
    pub set: Vec<ParamOverride>,
}

impl PlanEdits {
    pub fn parse(set: &[String], remove: Vec<String>, add: Vec<String>) -> Result<Self> {
        Ok(Self {
            remove,
            add,
            set: parse_overrides(set)?,
        })
    }
}

/// Apply edits in order: removals, additions, then parameter overrides
///
/// All or nothing: if any edit is refused the plan is put back as it was.
async fn apply_edits(
    session: &mut WorkflowSession,
    edits: &PlanEdits,
    handler: &dyn OutputHandler,
) -> Result<(), SessionError> {
    if !edits.add.is_empty() && session.state().tools.is_empty() {
        session.refresh_catalog().await?;
    }

    let before = session.state().clone();
    if let Err(e) = apply_each(session, edits, handler) {
        session.restore(before);
        return Err(e);
    }
    Ok(())
}

fn apply_each(
    session: &mut WorkflowSession,
    edits: &PlanEdits,
    handler: &dyn OutputHandler,
) -> Result<(), SessionError> {
    for step_id in &edits.remove {
        session.remove_task(step_id)?;
        handler.emit(OutputEvent::Debug {
            message: format!("Removed {}", step_id),
        });
    }

    for tool_id in &edits.add {
        session.add_task(tool_id)?;
        if let Some(task) = session.state().tasks.last() {
            handler.emit(OutputEvent::Info {
                message: format!("Added {} ({})", task.id(), tool_id),
            });
        }
    }

    for edit in &edits.set {
        session.update_param(&edit.step, &edit.param, edit.value.clone())?;
    }
    Ok(())
}

/// Plan a goal and print the laid-out grid
pub async fn plan_goal(
    session: &mut WorkflowSession,
    goal: &str,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    handler.emit(OutputEvent::PlanStart {
        goal: goal.to_string(),
    });

    if let Err(e) = session.plan(goal).await {
        return Ok(report_failure(e, handler));
    }

    emit_plan_ready(session.state(), handler);
    render(&session.state().tasks, handler);
    Ok(0)
}

/// Load a template and print the laid-out grid
pub async fn load_template(
    session: &mut WorkflowSession,
    template_id: &str,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    handler.emit(OutputEvent::Info {
        message: format!("Loading template '{}'...", template_id),
    });

    if let Err(e) = session.load_template(template_id).await {
        return Ok(report_failure(e, handler));
    }

    emit_plan_ready(session.state(), handler);
    render(&session.state().tasks, handler);
    Ok(0)
}

/// Plan (unless a plan is already being edited), apply edits, then execute
pub async fn run_goal(
    session: &mut WorkflowSession,
    goal: Option<&str>,
    edits: &PlanEdits,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    match goal {
        Some(goal) => {
            let code = plan_goal(session, goal, handler).await?;
            if code != 0 {
                return Ok(code);
            }
        }
        None if session.state().status == WorkflowStatus::Editing => {
            handler.emit(OutputEvent::Debug {
                message: format!("Running saved plan '{}'", session.state().goal),
            });
        }
        None => {
            handler.emit(OutputEvent::Error {
                error: format!(
                    "no plan to run (session is {}); pass a goal",
                    session.state().status
                ),
            });
            return Ok(1);
        }
    }

    if let Err(e) = apply_edits(session, edits, handler).await {
        return Ok(report_failure(e, handler));
    }

    handler.emit(OutputEvent::ExecutionStart {
        steps: session.state().tasks.len(),
    });

    match session.execute().await {
        Ok(()) => {}
        Err(SessionError::Api(e)) => {
            // Transport failures still leave the state failed; report per-step below
            tracing::debug!(error = %e, "Execution request failed");
        }
        Err(e) => return Ok(report_failure(e, handler)),
    }

    let state = session.state();
    for task in &state.tasks {
        handler.emit(OutputEvent::StepOutcome {
            step: task.id().to_string(),
            tool: task.step.tool_id.clone(),
            status: task.status,
            duration_ms: task.duration_ms,
            error: task.error.clone(),
        });
    }

    let success = state.status == WorkflowStatus::Completed;
    let counts = state.counts();
    handler.emit(OutputEvent::ExecutionComplete {
        success,
        completed: counts.completed,
        failed: counts.failed,
        total_credits: state.total_credits,
        total_duration_ms: state.total_duration_ms,
    });
    if let Some(ref error) = state.error {
        handler.emit(OutputEvent::Error {
            error: error.clone(),
        });
    }

    let output = final_output(&state.tasks);
    handler.result(success, output.as_deref());

    Ok(if success { 0 } else { 1 })
}

/// Edit the session's current plan without executing it
pub async fn edit_plan(
    session: &mut WorkflowSession,
    edits: &PlanEdits,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    if let Err(e) = apply_edits(session, edits, handler).await {
        return Ok(report_failure(e, handler));
    }

    emit_plan_ready(session.state(), handler);
    render(&session.state().tasks, handler);
    Ok(0)
}

/// Show one task with its tool schema
pub async fn inspect_task(
    session: &mut WorkflowSession,
    step_id: &str,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let schema = match session.select_task(Some(step_id)).await {
        Ok(schema) => schema.cloned(),
        Err(e) => return Ok(report_failure(e, handler)),
    };
    let Some(task) = session.state().selected_task() else {
        return Ok(1);
    };

    handler.emit(OutputEvent::Info {
        message: format!(
            "{} [{}] column {}, row {}: {}",
            task.id(),
            task.step.tool_id,
            task.column,
            task.row,
            task.status
        ),
    });
    if !task.step.description.is_empty() {
        handler.emit(OutputEvent::Info {
            message: task.step.description.clone(),
        });
    }
    if let Some(ref references) = task.step.dependencies {
        for (param, reference) in references {
            handler.emit(OutputEvent::Info {
                message: format!("  {} <- {}", param, reference),
            });
        }
    }
    if let Some(ref schema) = schema {
        for param in schema.required_params() {
            let wired = task
                .step
                .dependencies
                .as_ref()
                .is_some_and(|d| d.contains_key(param));
            if !wired && !task.step.params.contains_key(param) {
                handler.emit(OutputEvent::Diagnostic {
                    message: format!("{}: required param '{}' is not set", task.id(), param),
                });
            }
        }
    }
    if let Some(ref error) = task.error {
        handler.emit(OutputEvent::Error {
            error: error.clone(),
        });
    }

    let shown = task.result.as_ref().unwrap_or(&Value::Null);
    let output = serde_json::to_string_pretty(&serde_json::json!({
        "params": task.step.params,
        "result": shown,
    }))?;
    handler.result(task.status != StepStatus::Failed, Some(&output));
    Ok(0)
}

/// Result of the last completed task, pretty-printed
fn final_output(tasks: &[TaskNode]) -> Option<String> {
    tasks
        .iter()
        .filter(|t| t.status == StepStatus::Completed)
        .max_by_key(|t| (t.column, t.row))
        .and_then(|t| t.result.as_ref())
        .and_then(|r| serde_json::to_string_pretty(r).ok())
}

/// List available templates
pub async fn list_templates(session: &mut WorkflowSession, handler: &dyn OutputHandler) -> Result<i32> {
    if let Err(e) = session.refresh_catalog().await {
        return Ok(report_failure(e, handler));
    }

    let templates = &session.state().templates;
    if templates.is_empty() {
        handler.emit(OutputEvent::Info {
            message: "(no templates available)".into(),
        });
    }
    for template in templates {
        let mut line = format!("{}  {}", template.id, template.name);
        if !template.description.is_empty() {
            line.push_str(&format!(" - {}", template.description));
        }
        handler.emit(OutputEvent::Info { message: line });
    }
    Ok(0)
}

/// List the tool catalog
pub async fn list_tools(session: &mut WorkflowSession, handler: &dyn OutputHandler) -> Result<i32> {
    if let Err(e) = session.refresh_catalog().await {
        return Ok(report_failure(e, handler));
    }

    let tools = &session.state().tools;
    if tools.is_empty() {
        handler.emit(OutputEvent::Info {
            message: "(no tools available)".into(),
        });
    }
    for tool in tools {
        handler.emit(OutputEvent::Info {
            message: format!("{}  {} ({} credits)", tool.id, tool.name, tool.credit_cost),
        });
    }
    Ok(0)
}

/// Show a tool's parameter schema
pub async fn show_tool(
    session: &mut WorkflowSession,
    tool_id: &str,
    handler: &dyn OutputHandler,
) -> Result<i32> {
    let schema = match session.tool_schema(tool_id).await {
        Ok(schema) => schema,
        Err(e) => return Ok(report_failure(e, handler)),
    };

    handler.emit(OutputEvent::Info {
        message: format!("{} ({})", schema.name, schema.id),
    });
    if !schema.description.is_empty() {
        handler.emit(OutputEvent::Info {
            message: schema.description.clone(),
        });
    }
    let required = schema.required_params();
    if !required.is_empty() {
        handler.emit(OutputEvent::Info {
            message: format!("required: {}", required.join(", ")),
        });
    }

    let output = serde_json::to_string_pretty(&schema.input_schema)?;
    handler.result(true, Some(&output));
    Ok(0)
}

/// Read a plan from a JSON file
///
/// Accepts a bare plan or a planner response wrapping it in `plan`.
pub fn read_plan_file(path: &Path) -> Result<Plan> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut value: Value =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;

    if value.get("steps").is_none() {
        if let Some(inner) = value.get_mut("plan") {
            value = inner.take();
        }
    }

    serde_json::from_value(value).with_context(|| format!("reading plan from {}", path.display()))
}

/// Lay out a plan file offline
pub fn layout_file(path: &Path, handler: &dyn OutputHandler) -> Result<i32> {
    let plan = read_plan_file(path)?;

    for diagnostic in diagnose(&plan.steps) {
        handler.emit(OutputEvent::Diagnostic {
            message: diagnostic.to_string(),
        });
    }

    render(&layout_tasks(&plan.steps), handler);
    Ok(0)
}

/// Check a plan file, exit code 1 on any diagnostic
pub fn validate_file(path: &Path, handler: &dyn OutputHandler) -> Result<i32> {
    let plan = read_plan_file(path)?;
    let diagnostics = diagnose(&plan.steps);

    if diagnostics.is_empty() {
        handler.emit(OutputEvent::Info {
            message: format!("✓ Plan is valid ({} steps)", plan.steps.len()),
        });
        return Ok(0);
    }

    handler.emit(OutputEvent::Info {
        message: format!("✗ Plan has {} problem(s):", diagnostics.len()),
    });
    for diagnostic in &diagnostics {
        handler.emit(OutputEvent::Diagnostic {
            message: diagnostic.to_string(),
        });
    }
    Ok(1)
}

/// List saved sessions
pub fn list_sessions(store: &SessionStore, handler: &dyn OutputHandler) -> Result<i32> {
    let sessions = store.list()?;

    if sessions.is_empty() {
        handler.emit(OutputEvent::Info {
            message: "(no saved sessions)".into(),
        });
    }
    for session in sessions {
        handler.emit(OutputEvent::Info {
            message: format!(
                "{}  [{}] {} tasks  {}  {}",
                session.name, session.status, session.task_count, session.updated_at, session.goal
            ),
        });
    }
    Ok(0)
}

/// Print a saved session's grid
pub fn show_session(store: &SessionStore, name: &str, handler: &dyn OutputHandler) -> Result<i32> {
    let Some(state) = store.load(name)? else {
        handler.emit(OutputEvent::Error {
            error: format!("no saved session named '{}'", name),
        });
        return Ok(1);
    };

    handler.emit(OutputEvent::Info {
        message: format!("{} [{}] {}", name, state.status, state.goal),
    });
    if let Some(ref error) = state.error {
        handler.emit(OutputEvent::Error {
            error: error.clone(),
        });
    }
    render(&state.tasks, handler);
    Ok(0)
}

fn emit_plan_ready(state: &WorkflowState, handler: &dyn OutputHandler) {
    let Some(ref plan) = state.plan else {
        return;
    };
    handler.emit(OutputEvent::PlanReady {
        goal: plan.goal.clone(),
        steps: plan.steps.len(),
        estimated_credits: state.estimated_credits(),
        estimated_duration: plan.estimated_duration,
    });
    for diagnostic in diagnose(&plan.steps) {
        handler.emit(OutputEvent::Diagnostic {
            message: diagnostic.to_string(),
        });
    }
}

fn render(tasks: &[TaskNode], handler: &dyn OutputHandler) {
    handler.layout(tasks, &connectors(tasks));
}

fn report_failure(error: SessionError, handler: &dyn OutputHandler) -> i32 {
    let code = match error {
        SessionError::Cancelled => 130,
        _ => 1,
    };
    handler.emit(OutputEvent::Error {
        error: error.to_string(),
    });
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ExecuteResponse, TemplateBundle, WorkflowApi};
    use crate::cli::output::tests::MockHandler;
    use crate::plan::{Step, StepResult, TemplateSummary, ToolSchema, ToolSummary};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct StubApi {
        plan: Plan,
        executed: Mutex<Vec<Plan>>,
    }

    impl StubApi {
        fn new(plan: Plan) -> Arc<Self> {
            Arc::new(Self {
                plan,
                executed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WorkflowApi for StubApi {
        async fn plan(&self, _goal: &str) -> Result<Plan, ApiError> {
            Ok(self.plan.clone())
        }

        async fn load_template(&self, template_id: &str) -> Result<TemplateBundle, ApiError> {
            Err(ApiError::rejected(format!("template {} not found", template_id)))
        }

        async fn execute(&self, plan: &Plan) -> Result<ExecuteResponse, ApiError> {
            self.executed.lock().unwrap().push(plan.clone());
            let step_results = plan
                .steps
                .iter()
                .map(|s| StepResult::completed(s.id.clone(), json!({ "from": s.id }), 100))
                .collect();
            Ok(ExecuteResponse {
                success: true,
                step_results: Some(step_results),
                total_credits: Some(3.0),
                total_duration_ms: Some(300),
                error: None,
            })
        }

        async fn list_tools(&self) -> Result<Vec<ToolSummary>, ApiError> {
            Ok(vec![ToolSummary {
                id: "audio.generate".into(),
                name: "Generate Audio".into(),
                credit_cost: 1.0,
                ..Default::default()
            }])
        }

        async fn tool_schema(&self, tool_id: &str) -> Result<ToolSchema, ApiError> {
            Ok(ToolSchema {
                id: tool_id.to_string(),
                name: "Generate Image".into(),
                input_schema: json!({ "required": ["prompt"] }),
                ..Default::default()
            })
        }

        async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn chain_plan() -> Plan {
        Plan::new(
            "sunset video",
            vec![
                Step::new("step1", "image.generate").with_param("prompt", "sunset"),
                Step::new("step2", "video.animate").with_dependency("image", "$step1.output"),
                Step::new("step3", "video.upscale").with_dependency("video", "$step2.output"),
            ],
        )
    }

    fn has_error(handler: &MockHandler) -> bool {
        handler
            .events()
            .iter()
            .any(|e| matches!(e, OutputEvent::Error { .. }))
    }

    #[test]
    fn test_parse_overrides() {
        let args = vec![
            "step1.prompt=a sunset".to_string(),
            "step2.fps=24".to_string(),
            "step2.loop=true".to_string(),
        ];
        let parsed = parse_overrides(&args).unwrap();
        assert_eq!(parsed[0].step, "step1");
        assert_eq!(parsed[0].param, "prompt");
        assert_eq!(parsed[0].value, json!("a sunset"));
        assert_eq!(parsed[1].value, json!(24));
        assert_eq!(parsed[2].value, json!(true));
    }

    #[test]
    fn test_parse_overrides_rejects_malformed() {
        assert!(parse_overrides(&["step1prompt=x".to_string()]).is_err());
        assert!(parse_overrides(&["step1.prompt".to_string()]).is_err());
        assert!(parse_overrides(&[".prompt=x".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_plan_goal_renders_layout() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();

        let code = plan_goal(&mut session, "sunset video", &handler).await.unwrap();
        assert_eq!(code, 0);

        let layouts = handler.layouts.lock().unwrap();
        let columns: Vec<_> = layouts[0].iter().map(|t| t.column).collect();
        assert_eq!(columns, vec![0, 1, 2]);
        assert!(handler
            .events()
            .iter()
            .any(|e| matches!(e, OutputEvent::PlanReady { steps: 3, .. })));
    }

    #[tokio::test]
    async fn test_run_applies_edits_before_execute() {
        let api = StubApi::new(chain_plan());
        let mut session = WorkflowSession::new(api.clone());
        let handler = MockHandler::default();
        let edits = PlanEdits::parse(
            &["step1.prompt=dawn".to_string()],
            vec!["step3".to_string()],
            Vec::new(),
        )
        .unwrap();

        let code = run_goal(&mut session, Some("sunset video"), &edits, &handler)
            .await
            .unwrap();
        assert_eq!(code, 0);

        let executed = api.executed.lock().unwrap();
        assert_eq!(executed[0].steps.len(), 2);
        assert_eq!(executed[0].steps[0].params["prompt"], "dawn");

        assert_eq!(session.state().status, WorkflowStatus::Completed);
        assert!(handler
            .events()
            .iter()
            .any(|e| matches!(e, OutputEvent::ExecutionComplete { success: true, completed: 2, .. })));
    }

    #[tokio::test]
    async fn test_run_without_goal_needs_plan() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();

        let code = run_goal(&mut session, None, &PlanEdits::default(), &handler)
            .await
            .unwrap();
        assert_eq!(code, 1);
        assert!(has_error(&handler));
    }

    #[tokio::test]
    async fn test_edit_adds_catalog_tool() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();
        plan_goal(&mut session, "sunset video", &handler).await.unwrap();

        let edits = PlanEdits::parse(
            &["step4.prompt=rain".to_string()],
            Vec::new(),
            vec!["audio.generate".to_string()],
        )
        .unwrap();
        assert_eq!(edit_plan(&mut session, &edits, &handler).await.unwrap(), 0);

        let added = session.state().task("step4").unwrap();
        assert_eq!(added.step.tool_id, "audio.generate");
        assert_eq!(added.step.params["prompt"], "rain");
        assert_eq!((added.column, added.row), (0, 1));
    }

    #[tokio::test]
    async fn test_edit_unknown_tool_fails() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();
        plan_goal(&mut session, "sunset video", &handler).await.unwrap();

        let edits = PlanEdits::parse(&[], Vec::new(), vec!["nope".to_string()]).unwrap();
        assert_eq!(edit_plan(&mut session, &edits, &handler).await.unwrap(), 1);
        assert!(has_error(&handler));
        assert_eq!(session.state().tasks.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_plan_untouched() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();
        plan_goal(&mut session, "sunset video", &handler).await.unwrap();
        let before = session.state().clone();

        let edits = PlanEdits::parse(
            &["step1.prompt=dawn".to_string()],
            vec!["step3".to_string(), "nope".to_string()],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(edit_plan(&mut session, &edits, &handler).await.unwrap(), 1);
        assert!(has_error(&handler));
        assert_eq!(session.state(), &before);
        assert_eq!(session.state().tasks.len(), 3);

        // A bad override after a good removal is rolled back too
        let edits = PlanEdits::parse(
            &["step9.prompt=dusk".to_string()],
            vec!["step3".to_string()],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(edit_plan(&mut session, &edits, &handler).await.unwrap(), 1);
        assert!(session.state().task("step3").is_some());
        assert_eq!(session.state().task("step1").unwrap().step.params["prompt"], "sunset");
    }

    #[tokio::test]
    async fn test_inspect_flags_missing_required_param() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();
        plan_goal(&mut session, "sunset video", &handler).await.unwrap();

        assert_eq!(inspect_task(&mut session, "step2", &handler).await.unwrap(), 0);
        assert_eq!(session.state().selected.as_deref(), Some("step2"));
        assert!(handler.events().iter().any(|e| matches!(
            e,
            OutputEvent::Diagnostic { message } if message.contains("'prompt'")
        )));

        // step1 sets prompt, nothing to flag
        let handler = MockHandler::default();
        inspect_task(&mut session, "step1", &handler).await.unwrap();
        assert!(!handler
            .events()
            .iter()
            .any(|e| matches!(e, OutputEvent::Diagnostic { .. })));
    }

    #[tokio::test]
    async fn test_template_failure_reported() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();

        let code = load_template(&mut session, "missing", &handler).await.unwrap();
        assert_eq!(code, 1);
        assert!(has_error(&handler));
        assert_eq!(session.state().status, WorkflowStatus::Idle);
        assert!(session.state().error.is_some());
    }

    #[tokio::test]
    async fn test_show_tool_caches_schema() {
        let mut session = WorkflowSession::new(StubApi::new(chain_plan()));
        let handler = MockHandler::default();

        let code = show_tool(&mut session, "image.generate", &handler).await.unwrap();
        assert_eq!(code, 0);
        assert!(session.state().tool_schemas.contains_key("image.generate"));
        assert!(handler.events().iter().any(|e| matches!(
            e,
            OutputEvent::Info { message } if message == "required: prompt"
        )));
    }

    #[test]
    fn test_read_plan_file_bare_and_wrapped() {
        let dir = TempDir::new().unwrap();

        let bare = dir.path().join("bare.json");
        std::fs::write(&bare, serde_json::to_string(&chain_plan()).unwrap()).unwrap();
        assert_eq!(read_plan_file(&bare).unwrap().steps.len(), 3);

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            json!({ "success": true, "plan": chain_plan() }).to_string(),
        )
        .unwrap();
        assert_eq!(read_plan_file(&wrapped).unwrap().steps.len(), 3);

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(read_plan_file(&broken).is_err());
    }

    #[test]
    fn test_validate_file() {
        let dir = TempDir::new().unwrap();
        let handler = MockHandler::default();

        let good = dir.path().join("good.json");
        std::fs::write(&good, serde_json::to_string(&chain_plan()).unwrap()).unwrap();
        assert_eq!(validate_file(&good, &handler).unwrap(), 0);

        let cyclic = Plan::new(
            "loop",
            vec![
                Step::new("a", "t").with_dependency("x", "$b.output"),
                Step::new("b", "t").with_dependency("x", "$a.output"),
            ],
        );
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, serde_json::to_string(&cyclic).unwrap()).unwrap();
        assert_eq!(validate_file(&bad, &handler).unwrap(), 1);
    }

    #[test]
    fn test_layout_file_reports_dangling() {
        let dir = TempDir::new().unwrap();
        let handler = MockHandler::default();
        let plan = Plan::new(
            "dangling",
            vec![Step::new("step3", "video.upscale").with_dependency("video", "$step2.output")],
        );
        let path = dir.path().join("plan.json");
        std::fs::write(&path, serde_json::to_string(&plan).unwrap()).unwrap();

        assert_eq!(layout_file(&path, &handler).unwrap(), 0);
        assert!(handler
            .events()
            .iter()
            .any(|e| matches!(e, OutputEvent::Diagnostic { .. })));
        let layouts = handler.layouts.lock().unwrap();
        assert_eq!(layouts[0][0].column, 1);
    }

    #[test]
    fn test_show_session() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let handler = MockHandler::default();

        assert_eq!(show_session(&store, "nope", &handler).unwrap(), 1);

        let mut state = WorkflowState::new();
        state.goal = "poster".into();
        state.tasks = layout_tasks(&chain_plan().steps);
        store.save("poster", &state).unwrap();

        assert_eq!(show_session(&store, "poster", &handler).unwrap(), 0);
        assert_eq!(handler.layouts.lock().unwrap()[0].len(), 3);
        assert_eq!(list_sessions(&store, &handler).unwrap(), 0);
    }
}
