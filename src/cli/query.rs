//! Query and maintenance commands (ready, upcoming, overdue, status, check, refresh)

use anyhow::{bail, Result};

use super::output::Output;
use super::session::Session;
use super::task::print_tasks;
use crate::domain::{Date, ListFilter, SortKey};

/// Show open tasks whose dependencies are all done
pub fn ready(output: &Output, today: Date) -> Result<()> {
    let session = Session::open(output, today)?;
    let filter = ListFilter {
        unblocked: true,
        ..ListFilter::default()
    };
    let tasks = session
        .manager
        .query(&filter, &[SortKey::Priority, SortKey::Deadline], false, today);
    output.verbose_ctx("ready", &format!("Found {} ready tasks", tasks.len()));

    print_tasks(output, &session, &tasks, "No tasks ready to work on.");
    Ok(())
}

/// Show open tasks due within the window
pub fn upcoming(output: &Output, today: Date, days: Option<i64>) -> Result<()> {
    let session = Session::open(output, today)?;
    let days = days.unwrap_or(session.project.config().project.upcoming_days);
    let filter = ListFilter {
        upcoming: Some(days),
        ..ListFilter::default()
    };
    let tasks = session.manager.query(&filter, &[], false, today);

    print_tasks(
        output,
        &session,
        &tasks,
        &format!("Nothing due in the next {} days.", days),
    );
    Ok(())
}

/// Show open tasks past their deadline
pub fn overdue(output: &Output, today: Date) -> Result<()> {
    let session = Session::open(output, today)?;
    let filter = ListFilter {
        overdue: true,
        ..ListFilter::default()
    };
    let tasks = session.manager.query(&filter, &[], false, today);

    print_tasks(output, &session, &tasks, "No overdue tasks.");
    Ok(())
}

/// Show project status overview
pub fn status(output: &Output, today: Date, search: Option<&str>) -> Result<()> {
    let session = Session::open(output, today)?;
    let stats = session.manager.stats(today);
    let average = match search {
        Some(term) => session.manager.average_completion_days(Some(term)),
        None => stats.average_completion_days,
    };
    let ready = session.manager.graph().unblocked().count();
    let active_blueprints = session
        .manager
        .blueprints()
        .iter()
        .filter(|b| b.active)
        .count();

    if output.is_json() {
        output.data(&serde_json::json!({
            "today": today,
            "tasks": stats,
            "ready": ready,
            "blueprints": {
                "total": session.manager.blueprints().len(),
                "active": active_blueprints,
            },
            "average_completion_days": average,
            "search": search,
        }));
        return Ok(());
    }

    println!("Today: {}", today);
    println!();
    println!("Tasks: {} total", stats.overall);
    println!("  Done:        {}", stats.done);
    println!("  Open:        {}", stats.open);
    println!("  In progress: {}", stats.in_progress);
    println!("  Overdue:     {}", stats.overdue);
    println!("  Ready:       {}", ready);
    println!("  Projects:    {}", stats.projects);
    println!("Completion: {:.0}%", stats.completion_ratio * 100.0);
    match (average, search) {
        (Some(days), Some(term)) => println!("Average completion time for '{}': {:.1} days", term, days),
        (Some(days), None) => println!("Average completion time: {:.1} days", days),
        (None, Some(term)) => println!("No completed tasks match '{}'", term),
        (None, None) => {}
    }
    println!(
        "Blueprints: {} ({} active)",
        session.manager.blueprints().len(),
        active_blueprints
    );
    Ok(())
}

/// Report problems in the stored graph, optionally rewriting it repaired
pub fn check(output: &Output, today: Date, fix: bool) -> Result<()> {
    let session = Session::open(output, today)?;
    let report = &session.report;
    let problems = report.integrity.problems();
    let repairs = report.duplicates
        + report.dangling
        + report.rejected.len()
        + report.discarded.len()
        + report.corrections;

    if fix && (repairs > 0 || !problems.is_empty()) {
        session.save()?;
    }

    if output.is_json() {
        output.data(&serde_json::json!({
            "clean": problems.is_empty() && repairs == 0,
            "fixed": fix,
            "report": report,
        }));
        return Ok(());
    }

    if problems.is_empty() && repairs == 0 {
        output.success(&format!("Task graph is consistent ({} tasks)", report.tasks));
        return Ok(());
    }

    for problem in &problems {
        println!("  {}", problem);
    }
    for rejected in &report.rejected {
        println!("  rejected edge: {}", rejected);
    }
    for discarded in &report.discarded {
        println!("  dropped value: {}", discarded);
    }
    if report.duplicates > 0 {
        println!("  {} duplicate records", report.duplicates);
    }
    if report.dangling > 0 {
        println!("  {} references to missing tasks", report.dangling);
    }
    if report.corrections > 0 {
        println!("  {} completion states out of sync", report.corrections);
    }

    if fix {
        output.success("Rewrote the repaired task graph");
        Ok(())
    } else {
        bail!("Task graph has problems; run 'todo check --fix' to repair")
    }
}

/// Run blueprint generation, escalation and reconciliation now
pub fn refresh(output: &Output, today: Date) -> Result<()> {
    let mut session = Session::open(output, today)?;
    let maintenance = session.maintain()?;
    let corrections = session.report.corrections + session.manager.reconcile(today);
    session.save()?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "generated": maintenance.generated,
            "escalated": maintenance.escalated,
            "corrections": corrections,
        }));
    } else {
        output.success(&format!(
            "Generated {} tasks, escalated {}, corrected {}",
            maintenance.generated.len(),
            maintenance.escalated,
            corrections
        ));
    }
    Ok(())
}
