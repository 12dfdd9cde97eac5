//! Workflow session - drives the state machine from remote calls

use super::state::{Transition, WorkflowAction, WorkflowState};
use crate::api::{ApiError, WorkflowApi};
use crate::cli::signals::{CancellationToken, with_cancellation};
use crate::plan::ToolSchema;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("request cancelled")]
    Cancelled,

    #[error("{action} not allowed: {reason}")]
    InvalidState {
        action: &'static str,
        reason: String,
    },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

/// One user's workflow: state plus the service it talks to
///
/// Every remote call resolves into exactly one action. Cancelling the
/// session token (Ctrl-C, or `reset`) abandons the outstanding request.
pub struct WorkflowSession {
    state: WorkflowState,
    api: Arc<dyn WorkflowApi>,
    token: CancellationToken,
}

impl WorkflowSession {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self::with_state(api, WorkflowState::new())
    }

    /// Resume from a previously saved state
    ///
    /// A state saved mid-request can never receive its response, so it is
    /// reset (keeping the catalog).
    pub fn with_state(api: Arc<dyn WorkflowApi>, mut state: WorkflowState) -> Self {
        if state.status.is_transient() {
            tracing::warn!(status = %state.status, "Resumed session was mid-request, resetting");
            state.reduce(WorkflowAction::Reset);
        }
        Self {
            state,
            api,
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Token that cancels whichever request is in flight
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn dispatch(&mut self, action: WorkflowAction) -> Transition {
        self.state.reduce(action)
    }

    fn require(&mut self, action: WorkflowAction) -> Result<(), SessionError> {
        let name = action.name();
        match self.dispatch(action) {
            Transition::Applied => Ok(()),
            Transition::Ignored { reason } => Err(SessionError::InvalidState {
                action: name,
                reason,
            }),
        }
    }

    /// Race a request against the session token
    ///
    /// Cancellation leaves state alone; lifecycle requests go through
    /// `call_lifecycle` instead.
    async fn call<T, F>(&mut self, request: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match with_cancellation(self.token.clone(), request).await {
            Some(result) => result.map_err(SessionError::from),
            None => {
                self.token = CancellationToken::new();
                Err(SessionError::Cancelled)
            }
        }
    }

    /// Like `call`, for requests that moved the workflow into a transient
    /// status: a cancelled one resets to idle.
    async fn call_lifecycle<T, F>(&mut self, request: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let result = self.call(request).await;
        if matches!(result, Err(SessionError::Cancelled)) {
            tracing::info!(status = %self.state.status, "Request cancelled, resetting workflow");
            self.state.reduce(WorkflowAction::Reset);
        }
        result
    }

    /// Put back a state captured before a batch of edits that failed part way
    pub fn restore(&mut self, state: WorkflowState) {
        tracing::debug!(status = %state.status, "Restoring workflow state");
        self.state = state;
    }

    /// Plan a workflow for `goal`
    pub async fn plan(&mut self, goal: &str) -> Result<(), SessionError> {
        self.require(WorkflowAction::SetGoal(goal.to_string()))?;
        self.require(WorkflowAction::StartPlanning)?;
        let epoch = self.state.epoch;

        let api = Arc::clone(&self.api);
        match self.call_lifecycle(api.plan(goal)).await {
            Ok(plan) => {
                self.dispatch(WorkflowAction::PlanReceived { epoch, plan });
                Ok(())
            }
            Err(SessionError::Api(e)) => {
                self.dispatch(WorkflowAction::PlanError {
                    epoch,
                    error: e.to_string(),
                });
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Load a template as the current plan
    pub async fn load_template(&mut self, template_id: &str) -> Result<(), SessionError> {
        self.require(WorkflowAction::StartTemplate {
            template_id: template_id.to_string(),
        })?;
        let epoch = self.state.epoch;

        let api = Arc::clone(&self.api);
        match self.call_lifecycle(api.load_template(template_id)).await {
            Ok(bundle) => {
                self.dispatch(WorkflowAction::TemplateReceived { epoch, bundle });
                Ok(())
            }
            Err(SessionError::Api(e)) => {
                self.dispatch(WorkflowAction::PlanError {
                    epoch,
                    error: e.to_string(),
                });
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Execute the current plan
    ///
    /// A report with `success: false` is not an error here; the state ends
    /// up `failed` with per-step outcomes merged in.
    pub async fn execute(&mut self) -> Result<(), SessionError> {
        self.require(WorkflowAction::StartExecution)?;
        let epoch = self.state.epoch;
        let plan = self.state.plan.clone().unwrap_or_default();

        tracing::info!(steps = plan.steps.len(), epoch, "Executing workflow");
        let api = Arc::clone(&self.api);
        match self.call_lifecycle(api.execute(&plan)).await {
            Ok(response) => {
                self.dispatch(WorkflowAction::ExecutionResult { epoch, response });
                Ok(())
            }
            Err(SessionError::Api(e)) => {
                self.dispatch(WorkflowAction::ExecutionError {
                    epoch,
                    error: e.to_string(),
                });
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Select a task, fetching its tool schema when not yet cached
    pub async fn select_task(
        &mut self,
        step_id: Option<&str>,
    ) -> Result<Option<&ToolSchema>, SessionError> {
        self.require(WorkflowAction::SelectTask(step_id.map(str::to_string)))?;

        let Some(tool_id) = self.state.selected_task().map(|t| t.step.tool_id.clone()) else {
            return Ok(None);
        };

        self.tool_schema(&tool_id).await.map(Some)
    }

    /// Detailed schema for a tool, fetched once and cached in state
    pub async fn tool_schema(&mut self, tool_id: &str) -> Result<&ToolSchema, SessionError> {
        if !self.state.tool_schemas.contains_key(tool_id) {
            let api = Arc::clone(&self.api);
            let schema = self.call(api.tool_schema(tool_id)).await?;
            self.dispatch(WorkflowAction::ToolSchemaLoaded(schema));
        }

        self.state
            .tool_schemas
            .get(tool_id)
            .ok_or_else(|| SessionError::UnknownTool(tool_id.to_string()))
    }

    /// Fetch the tool catalog and template list
    pub async fn refresh_catalog(&mut self) -> Result<(), SessionError> {
        let api = Arc::clone(&self.api);

        let tools = self.call(api.list_tools()).await?;
        tracing::debug!(count = tools.len(), "Tool catalog loaded");
        self.dispatch(WorkflowAction::CatalogLoaded(tools));

        let templates = self.call(api.list_templates()).await?;
        tracing::debug!(count = templates.len(), "Templates loaded");
        self.dispatch(WorkflowAction::TemplatesLoaded(templates));

        Ok(())
    }

    /// Append a task for a catalog tool
    pub fn add_task(&mut self, tool_id: &str) -> Result<(), SessionError> {
        let tool = self
            .state
            .tool(tool_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownTool(tool_id.to_string()))?;
        self.require(WorkflowAction::AddTask { tool })
    }

    pub fn remove_task(&mut self, step_id: &str) -> Result<(), SessionError> {
        self.require(WorkflowAction::RemoveTask {
            step_id: step_id.to_string(),
        })
    }

    pub fn update_param(
        &mut self,
        step_id: &str,
        param: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        self.require(WorkflowAction::UpdateTaskParam {
            step_id: step_id.to_string(),
            param: param.to_string(),
            value,
        })
    }

    /// Abandon any outstanding request and start over
    pub fn reset(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.dispatch(WorkflowAction::Reset);
    }
}
