//! Loaded project state shared by the commands

use anyhow::Result;

use super::output::Output;
use crate::domain::{Date, LoadReport, TodoManager};
use crate::storage::{Maintenance, Project};

/// A project with its task graph loaded for one command
pub struct Session {
    pub project: Project,
    pub manager: TodoManager,
    pub report: LoadReport,
    pub today: Date,
}

impl Session {
    /// Loads the current project for reading
    pub fn open(output: &Output, today: Date) -> Result<Self> {
        let project = Project::open_current()?;
        output.verbose_ctx(
            "load",
            &format!("Opened project at: {}", project.root().display()),
        );

        let (manager, report) = project.load(today)?;
        output.verbose_ctx(
            "load",
            &format!(
                "Loaded {} tasks and {} blueprints ({} corrections)",
                report.tasks,
                manager.blueprints().len(),
                report.corrections
            ),
        );
        if !report.integrity.is_clean() {
            output.warning("Stored task graph was inconsistent and has been repaired in memory; run 'todo check --fix' to rewrite it");
        }

        Ok(Self {
            project,
            manager,
            report,
            today,
        })
    }

    /// Loads the current project and runs the configured upkeep
    pub fn open_for_update(output: &Output, today: Date) -> Result<Self> {
        let mut session = Self::open(output, today)?;
        let maintenance = session.maintain()?;
        if !maintenance.is_empty() {
            output.verbose_ctx(
                "upkeep",
                &format!(
                    "Generated {} tasks, escalated {}",
                    maintenance.generated.len(),
                    maintenance.escalated
                ),
            );
        }
        Ok(session)
    }

    pub fn maintain(&mut self) -> Result<Maintenance> {
        self.project.maintain(&mut self.manager, self.today)
    }

    pub fn save(&self) -> Result<()> {
        self.project.save(&self.manager)
    }
}
