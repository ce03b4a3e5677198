//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{blueprint, query, task};
use crate::domain::Date;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "todo")]
#[command(author, version, about = "Dependency-aware task manager with recurring blueprints")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Pretend today is this date (MM-DD-YYYY)
    #[arg(long, global = true, env = "TODO_TODAY", hide = true)]
    pub today: Option<Date>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new todo project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage tasks
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Manage recurring blueprints
    #[command(subcommand)]
    Blueprint(blueprint::BlueprintCommands),

    /// Show open tasks whose dependencies are done
    Ready,

    /// Show open tasks due soon
    Upcoming {
        /// Window in days (defaults to the project's upcoming_days)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Show open tasks past their deadline
    Overdue,

    /// Show project status overview
    Status {
        /// Average completion time only over this category or tag
        #[arg(long)]
        search: Option<String>,
    },

    /// Check the stored task graph for inconsistencies
    Check {
        /// Rewrite the stores with the repaired graph
        #[arg(long)]
        fix: bool,
    },

    /// Generate due blueprint tasks and escalate priorities now
    Refresh,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "todo_cli=debug,warn" } else { "warn" })
    });

    // Ignore the error if a subscriber is already installed (e.g. in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format,
    };
    let output = Output::new(format);
    let today = cli.today.unwrap_or_else(Date::today);

    output.verbose(&format!("todo starting, today is {}", today));

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created .todo directory at: {}", project.todo_dir().display()),
            );
            output.success(&format!(
                "Initialized todo project at {}",
                project.root().display()
            ));
        }

        Commands::Task(cmd) => task::run(cmd, &output, today)?,
        Commands::Blueprint(cmd) => blueprint::run(cmd, &output, today)?,

        Commands::Ready => query::ready(&output, today)?,
        Commands::Upcoming { days } => query::upcoming(&output, today, days)?,
        Commands::Overdue => query::overdue(&output, today)?,
        Commands::Status { search } => query::status(&output, today, search.as_deref())?,
        Commands::Check { fix } => query::check(&output, today, fix)?,
        Commands::Refresh => query::refresh(&output, today)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}
