//! Output handlers for CLI commands
//!
//! Supports console (pretty), JSON, and quiet output modes.

use crate::layout::{Connector, Grid};
use crate::plan::{StepStatus, TaskNode, format_reference};
use serde::{Deserialize, Serialize};

/// Output mode for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Console,
    Json,
    Quiet,
}

impl OutputMode {
    /// Parse from string
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "quiet" => Self::Quiet,
            _ => Self::Console,
        }
    }
}

/// Events emitted while planning and executing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputEvent {
    PlanStart {
        goal: String,
    },
    PlanReady {
        goal: String,
        steps: usize,
        estimated_credits: f64,
        estimated_duration: f64,
    },
    ExecutionStart {
        steps: usize,
    },
    StepOutcome {
        step: String,
        tool: String,
        status: StepStatus,
        duration_ms: Option<u64>,
        error: Option<String>,
    },
    ExecutionComplete {
        success: bool,
        completed: usize,
        failed: usize,
        total_credits: Option<f64>,
        total_duration_ms: Option<u64>,
    },
    Diagnostic {
        message: String,
    },
    Error {
        error: String,
    },
    Info {
        message: String,
    },
    Debug {
        message: String,
    },
}

/// Output handler trait
pub trait OutputHandler: Send + Sync {
    /// Emit an event
    fn emit(&self, event: OutputEvent);

    /// Render laid-out tasks and their connectors
    fn layout(&self, nodes: &[TaskNode], connectors: &[Connector]);

    /// Write final result
    fn result(&self, success: bool, output: Option<&str>);
}

/// Console output handler
pub struct ConsoleHandler {
    debug: bool,
}

impl ConsoleHandler {
    /// Create a new console handler
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn format_duration(ms: u64) -> String {
        if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        }
    }

    fn status_mark(status: StepStatus) -> &'static str {
        match status {
            StepStatus::Pending => "·",
            StepStatus::Running => "…",
            StepStatus::Completed => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Skipped => "-",
        }
    }

    /// One line per node, grouped by column
    fn render_grid(nodes: &[TaskNode], connectors: &[Connector]) -> String {
        let grid = Grid::new(nodes);
        let mut out = format!("{} columns, {} rows\n", grid.width(), grid.height());

        for (index, column) in grid.columns.iter().enumerate() {
            out.push_str(&format!("Column {}\n", index));
            for node in column {
                let name = if node.step.tool_name.is_empty() {
                    node.step.tool_id.as_str()
                } else {
                    node.step.tool_name.as_str()
                };
                out.push_str(&format!(
                    "  {} [{}] {} ({})",
                    Self::status_mark(node.status),
                    node.row,
                    node.id(),
                    name
                ));
                if let Some(ms) = node.duration_ms {
                    out.push_str(&format!(" {}", Self::format_duration(ms)));
                }
                out.push('\n');
            }
        }

        if !connectors.is_empty() {
            out.push_str("Connections\n");
            for line in connectors {
                out.push_str(&format!(
                    "  {} -> {}.{}\n",
                    format_reference(&line.from, &line.path),
                    line.to,
                    line.param
                ));
            }
        }

        out
    }
}

impl OutputHandler for ConsoleHandler {
    fn emit(&self, event: OutputEvent) {
        match event {
            OutputEvent::PlanStart { goal } => {
                eprintln!("Planning '{}'...", goal);
            }
            OutputEvent::PlanReady {
                steps,
                estimated_credits,
                estimated_duration,
                ..
            } => {
                eprintln!(
                    "Plan ready: {} steps, ~{} credits, ~{}s",
                    steps, estimated_credits, estimated_duration
                );
            }
            OutputEvent::ExecutionStart { steps } => {
                eprintln!("Executing {} steps...", steps);
            }
            OutputEvent::StepOutcome {
                step,
                tool,
                status,
                duration_ms,
                error,
            } => {
                let timing = duration_ms
                    .filter(|_| status.is_finished())
                    .map(|ms| format!(" ({})", Self::format_duration(ms)))
                    .unwrap_or_default();
                eprintln!("  {} {} [{}]{}", Self::status_mark(status), step, tool, timing);
                if let Some(err) = error {
                    eprintln!("      {}", err);
                }
            }
            OutputEvent::ExecutionComplete {
                success,
                completed,
                failed,
                total_credits,
                total_duration_ms,
            } => {
                eprintln!();
                let credits = total_credits
                    .map(|c| format!(", {} credits", c))
                    .unwrap_or_default();
                let duration = total_duration_ms
                    .map(|ms| format!(" in {}", Self::format_duration(ms)))
                    .unwrap_or_default();
                if success {
                    eprintln!(
                        "✓ Workflow completed ({} steps{}{})",
                        completed, duration, credits
                    );
                } else {
                    eprintln!(
                        "✗ Workflow failed ({} completed, {} failed{}{})",
                        completed, failed, duration, credits
                    );
                }
            }
            OutputEvent::Diagnostic { message } => {
                eprintln!("warning: {}", message);
            }
            OutputEvent::Error { error } => {
                eprintln!("Error: {}", error);
            }
            OutputEvent::Info { message } => {
                eprintln!("{}", message);
            }
            OutputEvent::Debug { message } => {
                if self.debug {
                    eprintln!("[debug] {}", message);
                }
            }
        }
    }

    fn layout(&self, nodes: &[TaskNode], connectors: &[Connector]) {
        if nodes.is_empty() {
            println!("(no tasks)");
            return;
        }
        print!("{}", Self::render_grid(nodes, connectors));
    }

    fn result(&self, _success: bool, output: Option<&str>) {
        if let Some(out) = output {
            println!("{}", out);
        }
    }
}

/// JSON output handler
pub struct JsonHandler {
    pretty: bool,
}

impl JsonHandler {
    /// Create a new JSON handler
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };

        if let Ok(s) = json {
            println!("{}", s);
        }
    }
}

impl OutputHandler for JsonHandler {
    fn emit(&self, event: OutputEvent) {
        self.print_json(&event);
    }

    fn layout(&self, nodes: &[TaskNode], connectors: &[Connector]) {
        #[derive(Serialize)]
        struct Layout<'a> {
            tasks: &'a [TaskNode],
            connectors: &'a [Connector],
        }

        self.print_json(&Layout {
            tasks: nodes,
            connectors,
        });
    }

    fn result(&self, success: bool, output: Option<&str>) {
        #[derive(Serialize)]
        struct FinalResult<'a> {
            success: bool,
            output: Option<&'a str>,
        }

        self.print_json(&FinalResult { success, output });
    }
}

/// Quiet handler that emits nothing
pub struct QuietHandler;

impl OutputHandler for QuietHandler {
    fn emit(&self, _event: OutputEvent) {}
    fn layout(&self, _nodes: &[TaskNode], _connectors: &[Connector]) {}
    fn result(&self, _success: bool, output: Option<&str>) {
        // Only print final output, nothing else
        if let Some(out) = output {
            println!("{}", out);
        }
    }
}

/// Create an output handler based on mode
pub fn create_handler(mode: OutputMode, debug: bool) -> Box<dyn OutputHandler> {
    match mode {
        OutputMode::Console => Box::new(ConsoleHandler::new(debug)),
        OutputMode::Json => Box::new(JsonHandler::new(true)),
        OutputMode::Quiet => Box::new(QuietHandler),
    }
}
