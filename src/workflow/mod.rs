//! Workflow lifecycle for taskflow
//!
//! This module handles:
//! - Workflow state (`idle -> planning -> editing -> executing -> completed | failed`)
//! - The reducer that applies plan data and execution results to it
//! - A session driver that calls the remote service and dispatches results
//!
//! # Example
//!
//! ```ignore
//! use taskflow::api::HttpWorkflowApi;
//! use taskflow::workflow::WorkflowSession;
//! use std::sync::Arc;
//!
//! let api = Arc::new(HttpWorkflowApi::from_config(&config.api)?);
//! let mut session = WorkflowSession::new(api);
//!
//! session.plan("generate a sunset image").await?;
//! session.execute().await?;
//!
//! println!("{}", session.state().status);
//! ```

mod session;
mod state;

pub use session::{SessionError, WorkflowSession};
pub use state::{WorkflowState, WorkflowStatus};

#[cfg(test)]
pub use state::WorkflowAction;
