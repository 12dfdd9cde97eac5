//! Workflow layout engine
//!
//! Turns a flat list of steps into grid positions for rendering:
//! - Dependency map from `$<stepId>.<path>` references
//! - Column = longest dependency chain, row = order within the column
//! - Connector lines between placed nodes
//! - Diagnostics for what layout tolerates (dangling refs, cycles)
//!
//! # Example
//!
//! ```ignore
//! use taskflow::layout::{layout_tasks, connectors};
//!
//! let nodes = layout_tasks(&plan.steps);
//! for line in connectors(&nodes) {
//!     println!("{} -> {}.{}", line.from, line.to, line.param);
//! }
//! ```

mod diagnostics;
mod engine;
mod grid;

pub use diagnostics::{Diagnostic, diagnose};
pub use engine::layout_tasks;
pub use grid::{Connector, Grid, connectors};
