//! Remote workflow service client
//!
//! The planner, executor and tool catalog live in a backend service. This
//! module only calls it; there is no retry layer, every retry is a fresh
//! user action.

mod http;
mod types;

pub use http::HttpWorkflowApi;
pub use types::{ApiError, ExecuteResponse, TemplateBundle, WorkflowApi};
