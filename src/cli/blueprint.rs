//! Blueprint CLI commands

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use super::output::Output;
use super::session::Session;
use crate::domain::{
    Blueprint, BlueprintDefinition, Category, Date, Priority, SubtaskTemplate,
};
use crate::storage::read_blueprint_file;

#[derive(Subcommand)]
pub enum BlueprintCommands {
    /// Add a recurring blueprint
    ///
    /// Examples:
    ///   todo blueprint add "Sheet {n}" -c university --every 7 --subtask "Solve@-1"
    ///   todo blueprint add "Rent" -c financial --every 30 --end 12-31-2025
    Add(AddArgs),

    /// Import blueprints from a YAML file
    Import {
        file: PathBuf,
    },

    /// List blueprints
    List,

    /// Show blueprint details
    Show {
        /// Blueprint ID or title pattern
        blueprint: String,
    },

    /// Generate every occurrence due up to today
    Run {
        /// Blueprint ID or title pattern (omit to run all)
        blueprint: Option<String>,
    },

    /// Stop a blueprint permanently
    Stop {
        /// Blueprint ID or title pattern
        blueprint: String,
    },
}

#[derive(Args)]
pub struct AddArgs {
    /// Title of each occurrence; `{n}` becomes the occurrence number
    pattern: String,

    #[arg(long, short)]
    category: Category,

    /// Days between occurrences
    #[arg(long)]
    every: u32,

    /// First day of the schedule (defaults to today)
    #[arg(long)]
    start: Option<Date>,

    /// No occurrence after this day
    #[arg(long)]
    end: Option<Date>,

    #[arg(long, short)]
    priority: Option<Priority>,

    #[arg(long)]
    description: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag", short)]
    tags: Vec<String>,

    /// Subtask as TITLE or TITLE@OFFSET, offset in days from the parent's deadline (repeatable)
    #[arg(long = "subtask", value_parser = parse_subtask)]
    subtasks: Vec<SubtaskTemplate>,
}

/// Parses `TITLE@OFFSET`; a missing offset means the parent's deadline
pub fn parse_subtask(value: &str) -> Result<SubtaskTemplate, String> {
    let (title, offset) = match value.rsplit_once('@') {
        Some((title, offset)) => {
            let offset = offset
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid subtask offset '{}'", offset.trim()))?;
            (title, offset)
        }
        None => (value, 0),
    };
    let title = title.trim();
    if title.is_empty() {
        return Err("subtask title cannot be empty".to_string());
    }
    Ok(SubtaskTemplate::new(title, offset))
}

pub fn run(cmd: BlueprintCommands, output: &Output, today: Date) -> Result<()> {
    match cmd {
        BlueprintCommands::Add(args) => add_blueprint(output, today, args),
        BlueprintCommands::Import { file } => import_blueprints(output, today, file),
        BlueprintCommands::List => list_blueprints(output, today),
        BlueprintCommands::Show { blueprint } => show_blueprint(output, today, &blueprint),
        BlueprintCommands::Run { blueprint } => run_blueprints(output, today, blueprint.as_deref()),
        BlueprintCommands::Stop { blueprint } => stop_blueprint(output, today, &blueprint),
    }
}

fn blueprint_json(blueprint: &Blueprint) -> serde_json::Value {
    let mut value = serde_json::to_value(blueprint).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        let next = blueprint.active.then(|| blueprint.next_occurrence());
        map.insert(
            "next_occurrence".to_string(),
            serde_json::to_value(next).unwrap_or_default(),
        );
    }
    value
}

/// Adds the blueprints and generates whatever is already due
fn install(
    output: &Output,
    session: &mut Session,
    definitions: Vec<BlueprintDefinition>,
) -> Result<Vec<Blueprint>> {
    let mut ids = Vec::new();
    for definition in definitions {
        let blueprint = Blueprint::from_definition(definition)?;
        ids.push(session.manager.add_blueprint(blueprint));
    }

    if session.project.config().project.automation.run_blueprints {
        for id in &ids {
            let generated = session
                .manager
                .run_blueprint(&id.to_string(), session.today)?;
            output.verbose_ctx(
                "blueprint",
                &format!("{} generated {} tasks", id, generated.len()),
            );
        }
    }
    session.save()?;

    let installed = ids
        .iter()
        .filter_map(|id| session.manager.find_blueprint(&id.to_string()).ok())
        .cloned()
        .collect();
    Ok(installed)
}

fn add_blueprint(output: &Output, today: Date, args: AddArgs) -> Result<()> {
    let definition = BlueprintDefinition {
        title_pattern: args.pattern,
        category: args.category,
        interval_days: args.every,
        start_date: args.start.unwrap_or(today),
        end_date: args.end,
        priority: args.priority,
        description: args.description,
        tags: args.tags,
        subtasks: args.subtasks,
    };

    let mut session = Session::open_for_update(output, today)?;
    let installed = install(output, &mut session, vec![definition])?;

    for blueprint in &installed {
        output.report(
            &blueprint_json(blueprint),
            &format!(
                "Created blueprint: {} - {} (every {} days)",
                blueprint.id, blueprint.title_pattern, blueprint.interval_days
            ),
        );
    }
    Ok(())
}

fn import_blueprints(output: &Output, today: Date, file: PathBuf) -> Result<()> {
    let definitions = read_blueprint_file(&file)?;
    output.verbose_ctx(
        "import",
        &format!("Read {} definitions from {}", definitions.len(), file.display()),
    );

    let mut session = Session::open_for_update(output, today)?;
    let installed = install(output, &mut session, definitions)?;

    if output.is_json() {
        let items: Vec<_> = installed.iter().map(blueprint_json).collect();
        output.data(&items);
    } else {
        for blueprint in &installed {
            output.success(&format!(
                "Imported blueprint: {} - {}",
                blueprint.id, blueprint.title_pattern
            ));
        }
    }
    Ok(())
}

fn list_blueprints(output: &Output, today: Date) -> Result<()> {
    let session = Session::open(output, today)?;
    let blueprints = session.manager.blueprints();

    if output.is_json() {
        let items: Vec<_> = blueprints.iter().map(blueprint_json).collect();
        output.data(&items);
    } else if blueprints.is_empty() {
        println!("No blueprints");
    } else {
        println!(
            "{:<12} {:<8} {:<6} {:<11} PATTERN",
            "ID", "STATE", "EVERY", "NEXT"
        );
        println!("{}", "-".repeat(60));
        for blueprint in blueprints {
            let (state, next) = if blueprint.active {
                ("active", blueprint.next_occurrence().to_string())
            } else {
                ("stopped", "-".to_string())
            };
            println!(
                "{:<12} {:<8} {:<6} {:<11} {}",
                blueprint.id.to_string(),
                state,
                blueprint.interval_days,
                next,
                blueprint.title_pattern
            );
        }
    }
    Ok(())
}

fn show_blueprint(output: &Output, today: Date, selector: &str) -> Result<()> {
    let session = Session::open(output, today)?;
    let blueprint = session.manager.find_blueprint(selector)?;

    if output.is_json() {
        output.data(&blueprint_json(blueprint));
        return Ok(());
    }

    println!("Blueprint: {}", blueprint.id);
    println!("Pattern: {}", blueprint.title_pattern);
    println!("Category: {}", blueprint.category);
    println!("Priority: {}", blueprint.priority);
    println!("Every: {} days", blueprint.interval_days);
    println!("Start: {}", blueprint.start_date);
    if let Some(end) = blueprint.end_date {
        println!("End: {}", end);
    }
    if blueprint.active {
        println!("Next occurrence: {}", blueprint.next_occurrence());
    } else {
        println!("State: stopped");
    }
    if !blueprint.subtasks.is_empty() {
        println!("\nSubtasks:");
        for template in &blueprint.subtasks {
            println!("  {} ({:+} days)", template.title, template.offset_days);
        }
    }
    if !blueprint.generated.is_empty() {
        println!("\nGenerated:");
        for id in &blueprint.generated {
            match session.manager.get(id) {
                Some(task) => println!("  {} {} ({})", id, task.title, task.status().label()),
                None => println!("  {} (removed)", id),
            }
        }
    }
    Ok(())
}

fn run_blueprints(output: &Output, today: Date, selector: Option<&str>) -> Result<()> {
    let mut session = Session::open(output, today)?;
    let generated = match selector {
        Some(selector) => session.manager.run_blueprint(selector, today)?,
        None => session.manager.run_blueprints(today)?,
    };
    session.save()?;

    if output.is_json() {
        let ids: Vec<String> = generated.iter().map(|id| id.to_string()).collect();
        output.data(&serde_json::json!({ "generated": ids }));
    } else if generated.is_empty() {
        println!("Nothing due");
    } else {
        for id in &generated {
            if let Some(task) = session.manager.get(id) {
                output.success(&format!(
                    "Generated task: {} - {} (due {})",
                    task.id, task.title, task.deadline
                ));
            }
        }
    }
    Ok(())
}

fn stop_blueprint(output: &Output, today: Date, selector: &str) -> Result<()> {
    let mut session = Session::open(output, today)?;
    let id = session.manager.deactivate_blueprint(selector)?;
    session.save()?;

    output.report(
        &serde_json::json!({
            "id": id.to_string(),
            "active": false,
        }),
        &format!("Stopped blueprint: {}", id),
    );
    Ok(())
}
