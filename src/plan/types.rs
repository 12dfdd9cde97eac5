//! Plan, step and catalog types shared with the remote workflow service

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Execution status of a single step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    /// Not attempted because an upstream step failed
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// True once the executor has reported a final outcome for the step
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single planned unit of work referencing one backend tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Step identifier (unique within a plan)
    pub id: String,

    /// Tool identifier, e.g. `image.generate`
    pub tool_id: String,

    /// Human-readable tool name
    #[serde(default)]
    pub tool_name: String,

    /// Literal parameter values
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Parameter name -> reference string (`$<stepId>.<path>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub description: String,
}

impl Step {
    pub fn new(id: impl Into<String>, tool_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_id: tool_id.into(),
            ..Default::default()
        }
    }

    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Take `param` from another step's output
    pub fn with_dependency(mut self, param: impl Into<String>, reference: impl Into<String>) -> Self {
        self.dependencies
            .get_or_insert_with(BTreeMap::new)
            .insert(param.into(), reference.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A step augmented with its grid position and live execution status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    #[serde(flatten)]
    pub step: Step,

    /// Longest dependency chain ending at this node
    pub column: usize,

    /// Position among nodes sharing the same column
    pub row: usize,

    #[serde(default)]
    pub status: StepStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl TaskNode {
    pub fn new(step: Step, column: usize, row: usize) -> Self {
        Self {
            step,
            column,
            row,
            status: StepStatus::Pending,
            result: None,
            error: None,
            duration_ms: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.step.id
    }

    /// Apply an executor result to this node
    pub fn apply_result(&mut self, result: &StepResult) {
        self.status = result.status;
        self.result = result.result.clone();
        self.error = result.error.clone();
        self.duration_ms = Some(result.duration_ms);
    }

    /// Drop any execution outcome and go back to `status`
    pub fn clear_outcome(&mut self, status: StepStatus) {
        self.status = status;
        self.result = None;
        self.error = None;
        self.duration_ms = None;
    }
}

/// Ordered steps plus cost and time estimates returned by the planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(default)]
    pub goal: String,

    #[serde(default)]
    pub steps: Vec<Step>,

    /// Estimated total credits
    #[serde(default)]
    pub estimated_credits: f64,

    /// Estimated duration in seconds
    #[serde(default)]
    pub estimated_duration: f64,
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            goal: goal.into(),
            steps,
            ..Default::default()
        }
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.steps.iter().any(|s| s.id == id)
    }
}

/// Per-step outcome reported by the remote executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,

    #[serde(default)]
    pub tool_id: String,

    pub status: StepStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl StepResult {
    pub fn completed(step_id: impl Into<String>, result: Value, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.into(),
            tool_id: String::new(),
            status: StepStatus::Completed,
            result: Some(result),
            error: None,
            duration_ms,
        }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.into(),
            tool_id: String::new(),
            status: StepStatus::Failed,
            result: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// Tool catalog entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    /// Credits charged per invocation
    #[serde(default)]
    pub credit_cost: f64,

    /// `sync` or `async` on the backend
    #[serde(default)]
    pub execution_mode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Detailed parameter schema for one tool, fetched on demand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchema {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub input_schema: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    #[serde(default)]
    pub examples: Vec<Value>,
}

impl ToolSchema {
    /// Names of the parameters the tool requires
    pub fn required_params(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Pre-built workflow offered next to the goal input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub estimated_credits: f64,
}
