//! Workflow plan data model
//!
//! Types here mirror the JSON contract of the remote planner and executor:
//! - `Plan` and `Step` as returned by planning or template loading
//! - `StepResult` as returned by execution
//! - `ToolSummary`, `ToolSchema`, `TemplateSummary` for the catalog
//! - `TaskNode`, a step with its grid position and live status

mod reference;
mod types;

pub use reference::{format_reference, parse_reference, referenced_step};
pub use types::{
    Plan, Step, StepResult, StepStatus, TaskNode, TemplateSummary, ToolSchema, ToolSummary,
};
