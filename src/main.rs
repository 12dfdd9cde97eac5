mod api;
mod cli;
mod config;
mod layout;
mod logging;
mod plan;
mod store;
mod workflow;

use anyhow::Result;
use api::HttpWorkflowApi;
use clap::{Args, Parser, Subcommand};
use cli::commands;
use cli::output::{OutputHandler, OutputMode};
use config::TaskflowConfig;
use std::path::PathBuf;
use std::sync::Arc;
use store::SessionStore;
use workflow::{WorkflowSession, WorkflowState};

#[derive(Parser)]
#[command(name = "taskflow")]
#[command(about = "Plan, lay out and run multi-step tool workflows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory for config lookup (defaults to current)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Workflow service base URL (overrides config)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Saved session to resume and update
    #[arg(long, global = true, default_value = "default")]
    session: String,

    /// Output mode: console, json or quiet
    #[arg(long, global = true)]
    output: Option<String>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Also write a log file (under the config dir unless `defaults.log_file` is set)
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a workflow for a goal and show its layout
    Plan {
        /// Natural-language goal
        #[arg(required = true, trailing_var_arg = true)]
        goal: Vec<String>,
    },

    /// Plan and execute a goal (or the session's current plan)
    Run {
        /// Natural-language goal; omit to run the saved plan
        #[arg(trailing_var_arg = true)]
        goal: Vec<String>,

        #[command(flatten)]
        edits: EditArgs,
    },

    /// Edit the session's current plan
    Edit {
        #[command(flatten)]
        edits: EditArgs,
    },

    /// Show one task of the session's plan with its tool schema
    Inspect {
        /// Step id
        step: String,
    },

    /// Load a template as the session's plan
    Template {
        /// Template id
        id: String,
    },

    /// List available templates
    Templates,

    /// List the tool catalog
    Tools,

    /// Show a tool's parameter schema
    Tool {
        /// Tool id, e.g. image.generate
        id: String,
    },

    /// Lay out a plan JSON file without contacting the service
    Layout {
        /// Plan file
        file: PathBuf,
    },

    /// Check a plan JSON file for dangling references and cycles
    Validate {
        /// Plan file
        file: PathBuf,
    },

    /// List saved sessions
    Sessions,

    /// Show a saved session's layout
    Show {
        /// Session name
        name: String,
    },

    /// Reset the session to idle
    Reset {
        /// Delete the saved session entirely
        #[arg(long)]
        forget: bool,
    },
}

#[derive(Args)]
struct EditArgs {
    /// Override a parameter (STEP.PARAM=VALUE, value parsed as JSON when possible)
    #[arg(long = "set", value_name = "STEP.PARAM=VALUE")]
    set: Vec<String>,

    /// Remove a step
    #[arg(long, value_name = "STEP")]
    remove: Vec<String>,

    /// Append a step for a catalog tool
    #[arg(long, value_name = "TOOL")]
    add: Vec<String>,
}

impl EditArgs {
    fn into_edits(self) -> Result<commands::PlanEdits> {
        commands::PlanEdits::parse(&self.set, self.remove, self.add)
    }
}

/// A session resumed from the store, saved back on `finish`
struct StoredSession {
    store: SessionStore,
    name: String,
    autosave: bool,
    session: WorkflowSession,
}

impl StoredSession {
    fn open(config: &TaskflowConfig, name: &str) -> Result<Self> {
        let store = SessionStore::open(&config.store_path()?)?;
        let state = store.load(name)?.unwrap_or_else(WorkflowState::new);
        if config.api.is_default() {
            tracing::debug!(url = config.api.base_url(), "No [api] config, using the default service URL");
        }
        let api = Arc::new(HttpWorkflowApi::from_config(&config.api)?);
        let session = WorkflowSession::with_state(api, state);

        if let Err(e) = cli::cancel_on_signal(session.cancellation_token()) {
            tracing::warn!(error = %e, "Failed to install signal handler");
        }

        Ok(Self {
            store,
            name: name.to_string(),
            autosave: config.store.autosave(),
            session,
        })
    }

    fn finish(mut self) -> Result<()> {
        if self.autosave {
            self.store.save(&self.name, self.session.state())?;
            tracing::debug!(session = %self.name, "Session saved");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TaskflowConfig::load(cli.dir.as_deref())?;
    if let Some(ref url) = cli.api_url {
        config.api.base_url = Some(url.clone());
    }

    let mode = if cli.quiet {
        OutputMode::Quiet
    } else {
        cli.output
            .as_deref()
            .or(config.defaults.output.as_deref())
            .map(OutputMode::from_str)
            .unwrap_or_default()
    };

    let log_file = match config.log_file() {
        Some(path) => Some(path),
        None if cli.log => Some(logging::default_log_path(&cli.session)?),
        None => None,
    };
    let guard = logging::init_logging(cli.debug, mode == OutputMode::Quiet, log_file)?;
    let handler = cli::create_handler(mode, cli.debug);

    let code = match dispatch(cli, &config, &*handler).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            handler.emit(cli::output::OutputEvent::Error {
                error: format!("{:#}", e),
            });
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}

async fn dispatch(cli: Cli, config: &TaskflowConfig, handler: &dyn OutputHandler) -> Result<i32> {
    let code = match cli.command {
        Commands::Layout { file } => commands::layout_file(&file, handler)?,

        Commands::Validate { file } => commands::validate_file(&file, handler)?,

        Commands::Sessions => {
            let store = SessionStore::open(&config.store_path()?)?;
            commands::list_sessions(&store, handler)?
        }

        Commands::Show { name } => {
            let store = SessionStore::open(&config.store_path()?)?;
            commands::show_session(&store, &name, handler)?
        }

        Commands::Reset { forget: true } => {
            let mut store = SessionStore::open(&config.store_path()?)?;
            if store.delete(&cli.session)? {
                tracing::info!(session = %cli.session, "Session deleted");
            }
            0
        }

        Commands::Reset { forget: false } => {
            let mut stored = StoredSession::open(config, &cli.session)?;
            stored.session.reset();
            stored.store.save(&cli.session, stored.session.state())?;
            0
        }

        Commands::Plan { goal } => {
            let mut stored = StoredSession::open(config, &cli.session)?;
            let code = commands::plan_goal(&mut stored.session, &goal.join(" "), handler).await?;
            stored.finish()?;
            code
        }

        Commands::Run { goal, edits } => {
            let edits = edits.into_edits()?;
            let goal = (!goal.is_empty()).then(|| goal.join(" "));

            let mut stored = StoredSession::open(config, &cli.session)?;
            let code =
                commands::run_goal(&mut stored.session, goal.as_deref(), &edits, handler).await?;
            stored.finish()?;
            code
        }

        Commands::Edit { edits } => {
            let edits = edits.into_edits()?;
            let mut stored = StoredSession::open(config, &cli.session)?;
            let code = commands::edit_plan(&mut stored.session, &edits, handler).await?;
            stored.finish()?;
            code
        }

        Commands::Inspect { step } => {
            let mut stored = StoredSession::open(config, &cli.session)?;
            let code = commands::inspect_task(&mut stored.session, &step, handler).await?;
            stored.finish()?;
            code
        }

        Commands::Template { id } => {
            let mut stored = StoredSession::open(config, &cli.session)?;
            let code = commands::load_template(&mut stored.session, &id, handler).await?;
            stored.finish()?;
            code
        }

        Commands::Templates => {
            let mut stored = StoredSession::open(config, &cli.session)?;
            let code = commands::list_templates(&mut stored.session, handler).await?;
            stored.finish()?;
            code
        }

        Commands::Tools => {
            let mut stored = StoredSession::open(config, &cli.session)?;
            let code = commands::list_tools(&mut stored.session, handler).await?;
            stored.finish()?;
            code
        }

        Commands::Tool { id } => {
            let mut stored = StoredSession::open(config, &cli.session)?;
            let code = commands::show_tool(&mut stored.session, &id, handler).await?;
            stored.finish()?;
            code
        }
    };

    Ok(code)
}
