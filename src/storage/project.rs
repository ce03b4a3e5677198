//! Project management
//!
//! Handles project initialization and loading/saving the task graph.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::{BlueprintStore, Config, ProjectConfig, TaskStore};
use crate::domain::{
    BlueprintDefinition, BlueprintFile, Date, LoadReport, TaskId, TodoManager,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a todo project. Run 'todo init' first.")]
    NotInProject,

    #[error("No blueprints found in {0}")]
    EmptyBlueprintFile(PathBuf),
}

/// Result of the automatic upkeep run before write commands
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Maintenance {
    pub generated: Vec<TaskId>,
    pub escalated: usize,
}

impl Maintenance {
    pub fn is_empty(&self) -> bool {
        self.generated.is_empty() && self.escalated == 0
    }
}

/// A todo project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".todo").is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path (idempotent)
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let todo_dir = root.join(".todo");

        fs::create_dir_all(&todo_dir).with_context(|| {
            format!("Failed to create .todo directory: {}", todo_dir.display())
        })?;

        let config_path = todo_dir.join("config.toml");
        if !config_path.exists() {
            let defaults = toml::to_string_pretty(&ProjectConfig::default())
                .context("Failed to serialize default config")?;
            let content = format!("# todo project configuration\n\n{}", defaults);
            fs::write(&config_path, content)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let project = Self::open(root)?;
        let (tasks, blueprints) = (project.task_store(), project.blueprint_store());
        for path in [tasks.path(), blueprints.path()] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("Failed to create store: {}", path.display()))?;
            }
        }
        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .todo directory path
    pub fn todo_dir(&self) -> PathBuf {
        self.root.join(".todo")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn task_store(&self) -> TaskStore {
        TaskStore::for_project(&self.root)
    }

    pub fn blueprint_store(&self) -> BlueprintStore {
        BlueprintStore::for_project(&self.root)
    }

    /// Reads both stores and relinks them into a manager
    pub fn load(&self, today: Date) -> Result<(TodoManager, LoadReport)> {
        let records = self.task_store().read_all()?;
        let blueprints = self.blueprint_store().read_all()?;
        debug!(
            tasks = records.len(),
            blueprints = blueprints.len(),
            root = %self.root.display(),
            "read stores"
        );

        Ok(TodoManager::from_records(
            records,
            blueprints,
            self.config.project.task_defaults(),
            today,
        ))
    }

    /// Writes the manager's tasks and blueprints back to disk
    pub fn save(&self, manager: &TodoManager) -> Result<()> {
        self.task_store().write_all(&manager.to_records())?;
        self.blueprint_store().write_all(manager.blueprints())?;
        debug!(tasks = manager.len(), "saved stores");
        Ok(())
    }

    /// Runs configured upkeep: blueprint generation, then escalation
    pub fn maintain(&self, manager: &mut TodoManager, today: Date) -> Result<Maintenance> {
        let settings = &self.config.project;
        let mut maintenance = Maintenance::default();

        if settings.automation.run_blueprints {
            maintenance.generated = manager.run_blueprints(today)?;
        }
        if settings.escalation.enabled {
            maintenance.escalated = manager.escalate_priorities(today, settings.escalation.mode);
        }

        if !maintenance.is_empty() {
            info!(
                generated = maintenance.generated.len(),
                escalated = maintenance.escalated,
                "ran upkeep"
            );
        }
        Ok(maintenance)
    }
}

/// Accepted layouts of a blueprint YAML file
#[derive(Deserialize)]
#[serde(untagged)]
enum BlueprintYaml {
    File(BlueprintFile),
    List(Vec<BlueprintDefinition>),
    Single(BlueprintDefinition),
}

/// Reads blueprint definitions from a YAML file
///
/// The file may hold a `blueprints:` list, a bare list, or one definition.
pub fn read_blueprint_file(path: &Path) -> Result<Vec<BlueprintDefinition>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read blueprint file: {}", path.display()))?;
    let parsed: BlueprintYaml = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse blueprint file: {}", path.display()))?;

    let definitions = match parsed {
        BlueprintYaml::File(file) => file.blueprints,
        BlueprintYaml::List(list) => list,
        BlueprintYaml::Single(definition) => vec![definition],
    };
    if definitions.is_empty() {
        return Err(ProjectError::EmptyBlueprintFile(path.to_path_buf()).into());
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Blueprint, Category, Priority, TaskDraft};
    use tempfile::TempDir;

    fn day(n: i64) -> Date {
        Date::new(2025, 2, 1).unwrap() + n
    }

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(project.todo_dir().is_dir());
        assert!(project.todo_dir().join("config.toml").is_file());
        assert!(project.task_store().path().is_file());
        assert!(project.blueprint_store().path().ends_with("blueprints.jsonl"));
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Project::init(dir.path()).unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert_eq!(project.config().project, ProjectConfig::default());
    }

    #[test]
    fn open_non_project_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Project::open(dir.path()).is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        let mut manager = TodoManager::new();
        let mut draft = TaskDraft::new("Tax return", Category::Financial);
        draft.priority = Some(Priority::Important);
        let id = manager.create_task(draft, day(0)).unwrap();
        project.save(&manager).unwrap();

        let (loaded, report) = project.load(day(0)).unwrap();
        assert_eq!(report.tasks, 1);
        assert_eq!(loaded.get(&id).unwrap().priority, Priority::Important);
    }

    #[test]
    fn maintain_generates_and_escalates() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();
        let mut manager = TodoManager::new();
        manager.add_blueprint(
            Blueprint::from_definition(BlueprintDefinition {
                title_pattern: "Rent {n}".to_string(),
                category: Category::Financial,
                interval_days: 10,
                start_date: day(0),
                end_date: None,
                priority: Some(Priority::Moderate),
                description: None,
                tags: Vec::new(),
                subtasks: Vec::new(),
            })
            .unwrap(),
        );

        // Occurrence on day 10, due day 20
        let maintenance = project.maintain(&mut manager, day(18)).unwrap();

        assert_eq!(maintenance.generated.len(), 1);
        assert_eq!(maintenance.escalated, 1);
        let task = manager.get(&maintenance.generated[0]).unwrap();
        assert_eq!(task.priority, Priority::Important);
    }

    #[test]
    fn reads_every_blueprint_layout() {
        let dir = TempDir::new().unwrap();
        let single = dir.path().join("single.yaml");
        fs::write(
            &single,
            "title_pattern: Gym\ncategory: Sport\ninterval_days: 2\nstart_date: 01-01-2025\n",
        )
        .unwrap();
        let nested = dir.path().join("nested.yaml");
        fs::write(
            &nested,
            "blueprints:\n  - title_pattern: A\n    category: Life\n    interval_days: 1\n    start_date: 01-01-2025\n  - title_pattern: B\n    category: Life\n    interval_days: 1\n    start_date: 01-01-2025\n",
        )
        .unwrap();

        assert_eq!(read_blueprint_file(&single).unwrap()[0].title_pattern, "Gym");
        assert_eq!(read_blueprint_file(&nested).unwrap().len(), 2);
    }

    #[test]
    fn empty_blueprint_list_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.yaml");
        fs::write(&path, "blueprints: []\n").unwrap();

        assert!(read_blueprint_file(&path).is_err());
    }
}
