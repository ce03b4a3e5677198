//! Task CLI commands

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use super::output::Output;
use super::session::Session;
use crate::domain::{
    Category, Date, DependencyNode, ListFilter, Priority, Selector, SortKey, Task, TaskDraft,
    TaskRecord, TaskUpdate,
};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    ///
    /// Examples:
    ///   todo task add "Essay" -c university -p important -d 03-15-2025
    ///   todo task add "Thesis" -c university --project
    ///   todo task add "Outline" -c university --parent Thesis
    Add(AddArgs),

    /// List tasks, sorted by deadline then priority unless --sort is given
    List(ListArgs),

    /// Show task details
    Show {
        /// Task ID or exact title
        task: String,
    },

    /// Show everything a task depends on, nested
    Tree {
        /// Task ID or exact title
        task: String,
    },

    /// Mark task as in progress (reopens it and its dependants first)
    Start {
        /// Task ID or exact title
        task: String,
    },

    /// Mark task as done
    Done {
        /// Task ID or exact title
        task: String,

        /// Hours actually spent
        #[arg(long)]
        hours: Option<f64>,
    },

    /// Reopen a task and every dependant that moved on
    Undo {
        /// Task ID or exact title
        task: String,
    },

    /// Remove a task (a project takes its whole subtree with it)
    Rm {
        /// Task ID or exact title
        task: String,
    },

    /// Make a task depend on another
    Dep {
        /// Task that waits
        parent: String,

        /// Task that must be completed first
        child: String,
    },

    /// Remove a dependency
    Undep {
        /// Task that waits
        parent: String,

        /// Dependency to remove
        child: String,
    },

    /// Change attributes with field=value pairs
    ///
    /// Fields: title, category, description, priority, deadline, project,
    /// estimate, tags (comma-separated).
    Edit {
        /// Task ID or exact title
        task: String,

        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Move the deadline by a number of days
    Extend {
        /// Task ID or exact title
        task: String,

        #[arg(allow_negative_numbers = true)]
        days: i64,
    },

    /// Add tags
    Tag {
        /// Task ID or exact title
        task: String,

        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Remove tags
    Untag {
        /// Task ID or exact title
        task: String,

        #[arg(required = true)]
        tags: Vec<String>,
    },
}

#[derive(Args)]
pub struct AddArgs {
    title: String,

    #[arg(long, short)]
    category: Category,

    #[arg(long, short)]
    priority: Option<Priority>,

    /// Deadline as MM-DD-YYYY
    #[arg(long, short, conflicts_with = "due_in")]
    deadline: Option<Date>,

    /// Deadline as days from today
    #[arg(long)]
    due_in: Option<i64>,

    #[arg(long)]
    description: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag", short)]
    tags: Vec<String>,

    /// Estimated hours
    #[arg(long)]
    estimate: Option<f64>,

    /// Complete automatically once all dependencies are done
    #[arg(long)]
    project: bool,

    /// Existing task that will depend on the new one
    #[arg(long)]
    parent: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, short)]
    pub category: Option<Category>,

    #[arg(long, short)]
    pub tag: Option<String>,

    #[arg(long, short)]
    pub priority: Option<Priority>,

    /// Only tasks past their deadline
    #[arg(long)]
    pub overdue: bool,

    /// Only open tasks due within this many days
    #[arg(long)]
    pub upcoming: Option<i64>,

    #[arg(long)]
    pub in_progress: bool,

    /// Only open tasks whose dependencies are done
    #[arg(long)]
    pub unblocked: bool,

    /// Only tasks nothing waits on
    #[arg(long)]
    pub roots: bool,

    /// Only tasks without dependencies
    #[arg(long)]
    pub leaves: bool,

    /// Hide done tasks
    #[arg(long)]
    pub open: bool,

    /// Sort keys, comma-separated (deadline, priority, created, title, category)
    #[arg(long, value_delimiter = ',')]
    pub sort: Vec<SortKey>,

    #[arg(long)]
    pub reverse: bool,
}

impl ListArgs {
    pub fn filter(&self) -> ListFilter {
        ListFilter {
            category: self.category,
            tag: self.tag.clone(),
            priority: self.priority,
            overdue: self.overdue,
            upcoming: self.upcoming,
            in_progress: self.in_progress,
            unblocked: self.unblocked,
            roots: self.roots,
            leaves: self.leaves,
            open_only: self.open,
        }
    }
}

pub fn run(cmd: TaskCommands, output: &Output, today: Date) -> Result<()> {
    match cmd {
        TaskCommands::Add(args) => add_task(output, today, args),
        TaskCommands::List(args) => list_tasks(output, today, &args),
        TaskCommands::Show { task } => show_task(output, today, &task),
        TaskCommands::Tree { task } => show_tree(output, today, &task),
        TaskCommands::Start { task } => start_task(output, today, &task),
        TaskCommands::Done { task, hours } => complete_task(output, today, &task, hours),
        TaskCommands::Undo { task } => reopen_task(output, today, &task),
        TaskCommands::Rm { task } => remove_task(output, today, &task),
        TaskCommands::Dep { parent, child } => add_dependency(output, today, &parent, &child),
        TaskCommands::Undep { parent, child } => {
            remove_dependency(output, today, &parent, &child)
        }
        TaskCommands::Edit { task, assignments } => edit_task(output, today, &task, &assignments),
        TaskCommands::Extend { task, days } => extend_task(output, today, &task, days),
        TaskCommands::Tag { task, tags } => tag_task(output, today, &task, &tags, true),
        TaskCommands::Untag { task, tags } => tag_task(output, today, &task, &tags, false),
    }
}

/// JSON shape shared by every command that prints tasks
pub(crate) fn task_json(task: &Task, session: &Session) -> serde_json::Value {
    let record = TaskRecord::from_task(task, session.manager.graph());
    let mut value = serde_json::to_value(record).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "unblocked".to_string(),
            session.manager.graph().is_unblocked(&task.id).into(),
        );
        map.insert(
            "days_left".to_string(),
            task.days_left(session.today).into(),
        );
    }
    value
}

/// Prints tasks as a table, or as a JSON array
pub(crate) fn print_tasks(output: &Output, session: &Session, tasks: &[&Task], empty: &str) {
    if output.is_json() {
        let items: Vec<_> = tasks.iter().map(|t| task_json(t, session)).collect();
        output.data(&items);
    } else if tasks.is_empty() {
        println!("{}", empty);
    } else {
        println!(
            "{:<12} {:<12} {:<11} {:<11} TITLE",
            "ID", "STATUS", "PRIORITY", "DEADLINE"
        );
        println!("{}", "-".repeat(72));
        for task in tasks {
            let marker = if task.is_project { " [project]" } else { "" };
            let overdue = if task.is_overdue(session.today) { " (overdue)" } else { "" };
            println!(
                "{:<12} {:<12} {:<11} {:<11} {}{}{}",
                task.id.to_string(),
                task.status().label(),
                task.priority.to_string(),
                task.deadline.to_string(),
                task.title,
                marker,
                overdue
            );
        }
    }
}

fn add_task(output: &Output, today: Date, args: AddArgs) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;

    let mut draft = TaskDraft::new(args.title, args.category);
    draft.priority = args.priority;
    draft.deadline = args.deadline.or(args.due_in.map(|days| today + days));
    draft.description = args.description;
    draft.tags = args.tags;
    draft.estimated_hours = args.estimate;
    draft.is_project = args.project;

    // Resolve before creating so a bad parent leaves nothing behind
    let parent = match &args.parent {
        Some(parent) => Some(session.manager.resolve(&Selector::parse(parent))?),
        None => None,
    };

    let id = session.manager.create_task(draft, today)?;
    if let Some(parent) = parent {
        output.verbose_ctx("add", &format!("Linking {} under {}", id, parent));
        if let Err(err) = session
            .manager
            .link(&parent.into(), &id.clone().into(), today)
        {
            session.save()?;
            bail!("Created task {} but could not link it: {}", id, err);
        }
    }
    session.save()?;

    let task = session
        .manager
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?;
    output.report(
        &task_json(task, &session),
        &format!("Created task: {} - {}", task.id, task.title),
    );

    Ok(())
}

fn list_tasks(output: &Output, today: Date, args: &ListArgs) -> Result<()> {
    let session = Session::open(output, today)?;
    let tasks = session
        .manager
        .query(&args.filter(), &args.sort, args.reverse, today);
    output.verbose_ctx("list", &format!("{} tasks match", tasks.len()));

    print_tasks(output, &session, &tasks, "No tasks");
    Ok(())
}

fn show_task(output: &Output, today: Date, selector: &str) -> Result<()> {
    let session = Session::open(output, today)?;
    let graph = session.manager.graph();
    let task = session.manager.find(&Selector::parse(selector))?;
    let blocking = graph.blocking_tasks(&task.id);

    if output.is_json() {
        let mut value = task_json(task, &session);
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "blocked_by".to_string(),
                blocking
                    .iter()
                    .map(|t| t.id.to_string())
                    .collect::<Vec<_>>()
                    .into(),
            );
        }
        output.data(&value);
        return Ok(());
    }

    println!("Task: {}", task.id);
    println!("Title: {}", task.title);
    println!("Status: {}", task.status().label());
    println!("Category: {}", task.category);
    println!("Priority: {}", task.priority);
    println!("Created: {}", task.created_on);
    println!(
        "Deadline: {} ({} days left)",
        task.deadline,
        task.days_left(today)
    );
    if let Some(completed) = task.completed_on() {
        println!("Completed: {}", completed);
    }
    if task.is_project {
        println!("Type: Project");
    }
    if let Some(hours) = task.estimated_hours {
        println!("Estimated hours: {}", hours);
    }
    if let Some(hours) = task.actual_hours() {
        println!("Actual hours: {}", hours);
    }
    if !task.tags().is_empty() {
        println!("Tags: {}", task.tags().join(", "));
    }
    if let Some(blueprint) = &task.blueprint {
        println!("Blueprint: {}", blueprint);
    }

    if !task.dependencies().is_empty() {
        println!("\nDepends on:");
        for dep in task.dependencies() {
            match graph.get(dep) {
                Some(dep) => println!("  {} {} ({})", dep.id, dep.title, dep.status().label()),
                None => println!("  {} (missing)", dep),
            }
        }
    }
    if let Some(parent) = task.dependants().first().and_then(|id| graph.get(id)) {
        println!("\nNeeded by: {} {}", parent.id, parent.title);
    }

    if let Some(desc) = &task.description {
        println!("\nDescription:");
        println!("{}", desc);
    }

    println!();
    if task.is_done() {
        println!("Status: DONE");
    } else if blocking.is_empty() {
        println!("Status: READY (all dependencies complete)");
    } else {
        println!("Status: BLOCKED (waiting on {} dependencies)", blocking.len());
    }

    Ok(())
}

fn print_node(node: &DependencyNode, depth: usize) {
    let marker = if node.is_project { " [project]" } else { "" };
    let repeated = if node.repeated { " (repeated)" } else { "" };
    println!(
        "{}{} {} ({}){}{}",
        "  ".repeat(depth),
        node.id,
        node.title,
        node.status.label(),
        marker,
        repeated
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn show_tree(output: &Output, today: Date, selector: &str) -> Result<()> {
    let session = Session::open(output, today)?;
    let id = session.manager.resolve(&Selector::parse(selector))?;
    let tree = session
        .manager
        .graph()
        .dependency_tree(&id)
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?;

    if output.is_json() {
        output.data(&tree);
    } else {
        print_node(&tree, 0);
    }
    Ok(())
}

fn start_task(output: &Output, today: Date, selector: &str) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let selector = Selector::parse(selector);
    let id = session.manager.resolve(&selector)?;

    let started = session.manager.set_in_progress(&selector, today)?;
    session.save()?;

    let message = if started {
        format!("Started task: {}", id)
    } else {
        format!("Task {} is already in progress", id)
    };
    output.report(
        &serde_json::json!({
            "id": id.to_string(),
            "status": "in_progress",
            "changed": started,
        }),
        &message,
    );

    Ok(())
}

fn complete_task(output: &Output, today: Date, selector: &str, hours: Option<f64>) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let selector = Selector::parse(selector);
    let id = session.manager.resolve(&selector)?;

    let already_done = session.manager.get(&id).is_some_and(Task::is_done);
    if !already_done {
        let blocking: Vec<String> = session
            .manager
            .graph()
            .blocking_tasks(&id)
            .iter()
            .map(|t| format!("{} ({})", t.id, t.title))
            .collect();
        if !blocking.is_empty() {
            bail!("Task {} is blocked by: {}", id, blocking.join(", "));
        }
    }

    let completed = session.manager.mark_done(&selector, hours, today)?;
    session.save()?;

    let message = if completed {
        format!("Completed task: {}", id)
    } else {
        format!("Task {} is already done", id)
    };
    output.report(
        &serde_json::json!({
            "id": id.to_string(),
            "status": "done",
            "changed": completed,
            "completed_on": session.manager.get(&id).and_then(Task::completed_on),
        }),
        &message,
    );

    Ok(())
}

fn reopen_task(output: &Output, today: Date, selector: &str) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let selector = Selector::parse(selector);
    let id = session.manager.resolve(&selector)?;

    let changed = session.manager.mark_undone(&selector, today)?;
    session.save()?;

    let message = if changed {
        format!("Reopened task: {}", id)
    } else {
        format!("Task {} was not done", id)
    };
    output.report(
        &serde_json::json!({
            "id": id.to_string(),
            "status": "todo",
            "changed": changed,
        }),
        &message,
    );

    Ok(())
}

fn remove_task(output: &Output, today: Date, selector: &str) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let removed = session
        .manager
        .remove_task(&Selector::parse(selector), today)?;
    session.save()?;

    if output.is_json() {
        let ids: Vec<String> = removed.iter().map(|t| t.id.to_string()).collect();
        output.data(&serde_json::json!({ "removed": ids }));
    } else {
        for task in &removed {
            output.success(&format!("Removed task: {} - {}", task.id, task.title));
        }
    }

    Ok(())
}

fn add_dependency(output: &Output, today: Date, parent: &str, child: &str) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let parent = session.manager.resolve(&Selector::parse(parent))?;
    let child = session.manager.resolve(&Selector::parse(child))?;

    let added = session
        .manager
        .link(&parent.clone().into(), &child.clone().into(), today)?;
    session.save()?;

    let message = if added {
        format!("{} now depends on {}", parent, child)
    } else {
        format!("{} already depends on {}", parent, child)
    };
    output.report(
        &serde_json::json!({
            "task": parent.to_string(),
            "depends_on": child.to_string(),
            "changed": added,
        }),
        &message,
    );

    Ok(())
}

fn remove_dependency(output: &Output, today: Date, parent: &str, child: &str) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let parent = session.manager.resolve(&Selector::parse(parent))?;
    let child = session.manager.resolve(&Selector::parse(child))?;

    let removed = session
        .manager
        .unlink(&parent.clone().into(), &child.clone().into(), today)?;
    session.save()?;

    let message = if removed {
        format!("Removed dependency: {} no longer depends on {}", parent, child)
    } else {
        format!("{} did not depend on {}", parent, child)
    };
    output.report(
        &serde_json::json!({
            "task": parent.to_string(),
            "removed_dependency": child.to_string(),
            "changed": removed,
        }),
        &message,
    );

    Ok(())
}

fn edit_task(output: &Output, today: Date, selector: &str, assignments: &[String]) -> Result<()> {
    let mut update = TaskUpdate::new();
    for assignment in assignments {
        update.parse_assignment(assignment)?;
    }

    let mut session = Session::open_for_update(output, today)?;
    let id = session
        .manager
        .update(&Selector::parse(selector), &update, today)?;
    session.save()?;

    let task = session
        .manager
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?;
    output.report(
        &task_json(task, &session),
        &format!("Updated task: {} - {}", task.id, task.title),
    );

    Ok(())
}

fn extend_task(output: &Output, today: Date, selector: &str, days: i64) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let selector = Selector::parse(selector);
    let id = session.manager.resolve(&selector)?;
    let deadline = session.manager.extend_deadline(&selector, days)?;
    session.save()?;

    output.report(
        &serde_json::json!({
            "id": id.to_string(),
            "deadline": deadline,
        }),
        &format!("Deadline of {} is now {}", id, deadline),
    );

    Ok(())
}

fn tag_task(output: &Output, today: Date, selector: &str, tags: &[String], add: bool) -> Result<()> {
    let mut session = Session::open_for_update(output, today)?;
    let selector = Selector::parse(selector);
    let id = session.manager.resolve(&selector)?;

    let mut changed = Vec::new();
    for tag in tags {
        let applied = if add {
            session.manager.add_tag(&selector, tag)?
        } else {
            session.manager.remove_tag(&selector, tag)?
        };
        if applied {
            changed.push(tag.trim().to_string());
        }
    }
    session.save()?;

    let current = session
        .manager
        .get(&id)
        .map(|t| t.tags().to_vec())
        .unwrap_or_default();
    if output.is_json() {
        output.data(&serde_json::json!({
            "id": id.to_string(),
            "changed": changed,
            "tags": current,
        }));
    } else if changed.is_empty() {
        output.success(&format!("Tags of {} unchanged", id));
    } else {
        let verb = if add { "Tagged" } else { "Untagged" };
        output.success(&format!("{} {}: {}", verb, id, changed.join(", ")));
    }

    Ok(())
}
