//! CLI module for taskflow
//!
//! This module provides:
//! - Command implementations (plan, run, layout, validate, etc.)
//! - Output handlers (console, JSON, quiet)
//! - Cancellation of in-flight requests on Ctrl-C
//!
//! # Example
//!
//! ```ignore
//! use taskflow::cli::{commands, output};
//!
//! let handler = output::create_handler(output::OutputMode::Console, false);
//! let exit_code = commands::plan_goal(&mut session, "a sunset video", &*handler).await?;
//! ```

pub mod commands;
pub mod output;
pub mod signals;

pub use output::{OutputMode, create_handler};
pub use signals::cancel_on_signal;
