//! Core types and traits for talking to the workflow service

use crate::plan::{Plan, StepResult, TemplateSummary, ToolSchema, ToolSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error types that can occur calling the workflow service
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Request timed out
    #[error("timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Authentication failed
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Network or server error
    #[error("network error: {message}")]
    Network { message: String },

    /// Failed to parse response
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Service answered but refused the request (`success: false` or 4xx)
    #[error("{message}")]
    Rejected { message: String },

    /// Invalid client configuration
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl ApiError {
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Check a `{ success, <payload>?, error? }` envelope
pub(crate) fn unwrap_envelope<T>(
    success: bool,
    payload: Option<T>,
    error: Option<String>,
    what: &str,
) -> Result<T, ApiError> {
    if !success {
        return Err(ApiError::rejected(
            error.unwrap_or_else(|| format!("{} failed", what)),
        ));
    }
    payload.ok_or_else(|| ApiError::parse(format!("{} response missing payload", what)))
}

/// Planner response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub success: bool,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Template load response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub success: bool,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub step_results: Option<Vec<StepResult>>,
    #[serde(default)]
    pub total_credits: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A loaded template: its plan plus any bundled example results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateBundle {
    pub plan: Plan,
    pub step_results: Vec<StepResult>,
    pub total_credits: Option<f64>,
}

impl TryFrom<TemplateResponse> for TemplateBundle {
    type Error = ApiError;

    fn try_from(response: TemplateResponse) -> Result<Self, Self::Error> {
        let plan = unwrap_envelope(response.success, response.plan, response.error, "template")?;
        Ok(Self {
            plan,
            step_results: response.step_results.unwrap_or_default(),
            total_credits: response.total_credits,
        })
    }
}

/// Executor response
///
/// `success: false` is still a report: individual step results may be
/// present and are merged onto the tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(default)]
    pub step_results: Option<Vec<StepResult>>,
    #[serde(default)]
    pub total_credits: Option<f64>,
    #[serde(default)]
    pub total_duration_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Tool catalog response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub tools: Option<Vec<ToolSummary>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Single tool schema response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchemaResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub tool: Option<ToolSchema>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Template list response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatesResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub templates: Option<Vec<TemplateSummary>>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Remote planner, executor and catalog
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Plan a workflow for a natural-language goal
    async fn plan(&self, goal: &str) -> Result<Plan, ApiError>;

    /// Load a pre-built template by id
    async fn load_template(&self, template_id: &str) -> Result<TemplateBundle, ApiError>;

    /// Execute a plan; `Err` only when no report came back at all
    async fn execute(&self, plan: &Plan) -> Result<ExecuteResponse, ApiError>;

    /// List the tool catalog
    async fn list_tools(&self) -> Result<Vec<ToolSummary>, ApiError>;

    /// Fetch the detailed schema of one tool
    async fn tool_schema(&self, tool_id: &str) -> Result<ToolSchema, ApiError>;

    /// List available templates
    async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope() {
        assert_eq!(unwrap_envelope(true, Some(1), None, "plan").unwrap(), 1);

        let err = unwrap_envelope::<u32>(false, None, Some("no credits".into()), "plan").unwrap_err();
        assert!(matches!(err, ApiError::Rejected { .. }));
        assert_eq!(err.to_string(), "no credits");

        let err = unwrap_envelope::<u32>(false, None, None, "plan").unwrap_err();
        assert_eq!(err.to_string(), "plan failed");

        let err = unwrap_envelope::<u32>(true, None, None, "plan").unwrap_err();
        assert!(matches!(err, ApiError::Parse { .. }));
    }

    #[test]
    fn test_template_bundle_from_response() {
        let response: TemplateResponse = serde_json::from_value(json!({
            "success": true,
            "plan": {
                "goal": "Album cover",
                "steps": [{ "id": "step1", "toolId": "image.generate" }],
                "estimatedCredits": 4,
                "estimatedDuration": 20
            },
            "stepResults": [{
                "stepId": "step1",
                "toolId": "image.generate",
                "status": "completed",
                "result": { "url": "https://cdn.example/cover.png" },
                "durationMs": 900
            }],
            "totalCredits": 4
        }))
        .unwrap();

        let bundle = TemplateBundle::try_from(response).unwrap();
        assert_eq!(bundle.plan.steps.len(), 1);
        assert_eq!(bundle.plan.estimated_credits, 4.0);
        assert_eq!(bundle.step_results.len(), 1);
        assert_eq!(bundle.total_credits, Some(4.0));
    }

    #[test]
    fn test_execute_response_failure_keeps_results() {
        let response: ExecuteResponse = serde_json::from_value(json!({
            "success": false,
            "stepResults": [
                { "stepId": "step1", "status": "failed", "error": "boom", "durationMs": 10 }
            ],
            "error": "step1 failed"
        }))
        .unwrap();

        assert!(!response.success);
        assert_eq!(response.step_results.unwrap().len(), 1);
        assert_eq!(response.error.as_deref(), Some("step1 failed"));
    }

    #[test]
    fn test_tools_response_defaults_success() {
        let response: ToolsResponse = serde_json::from_value(json!({
            "tools": [{ "id": "image.generate", "name": "Image", "creditCost": 2 }]
        }))
        .unwrap();
        assert!(response.success);
        assert_eq!(response.tools.unwrap()[0].credit_cost, 2.0);
    }
}
