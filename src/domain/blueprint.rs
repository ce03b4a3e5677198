//! Recurring task blueprints
//!
//! A blueprint stamps out one task tree per interval: a parent task titled
//! from a pattern (`"Sheet {n}"`) plus a fresh copy of every subtask
//! template, linked under the parent. The cursor remembers the last
//! occurrence produced, so running again never duplicates work.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::category::Category;
use super::date::Date;
use super::graph::GraphError;
use super::id::{BlueprintId, TaskId};
use super::manager::TodoManager;
use super::priority::Priority;
use super::task::{validate_hours, validate_tag, Task, TaskError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlueprintError {
    #[error("Invalid blueprint interval {0}: must be at least one day")]
    InvalidInterval(u32),

    #[error("Blueprint end date {end} is before its start date {start}")]
    EndBeforeStart { start: Date, end: Date },

    #[error("Blueprint title pattern cannot be empty")]
    EmptyPattern,

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// One subtask stamped out with every occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskTemplate {
    pub title: String,

    /// Falls back to the blueprint's priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    /// Deadline relative to the parent's deadline
    #[serde(default)]
    pub offset_days: i64,
}

impl SubtaskTemplate {
    pub fn new(title: impl Into<String>, offset_days: i64) -> Self {
        Self {
            title: title.into(),
            priority: None,
            tags: Vec::new(),
            description: None,
            estimated_hours: None,
            offset_days,
        }
    }
}

/// User-supplied blueprint fields, as read from YAML or the command line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlueprintDefinition {
    pub title_pattern: String,
    pub category: Category,
    pub interval_days: u32,
    pub start_date: Date,
    #[serde(default)]
    pub end_date: Option<Date>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskTemplate>,
}

/// A file holding several definitions under `blueprints:`
#[derive(Debug, Clone, Deserialize)]
pub struct BlueprintFile {
    pub blueprints: Vec<BlueprintDefinition>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: BlueprintId,

    pub title_pattern: String,

    pub category: Category,

    pub interval_days: u32,

    pub start_date: Date,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Date>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<SubtaskTemplate>,

    /// Date of the last occurrence produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Date>,

    /// Parent task of every occurrence, oldest first
    #[serde(default)]
    pub generated: Vec<TaskId>,

    #[serde(default = "default_active")]
    pub active: bool,
}

impl Blueprint {
    /// Validates a definition and creates an active blueprint
    pub fn from_definition(definition: BlueprintDefinition) -> Result<Self, BlueprintError> {
        if definition.title_pattern.trim().is_empty() {
            return Err(BlueprintError::EmptyPattern);
        }
        if definition.interval_days == 0 {
            return Err(BlueprintError::InvalidInterval(0));
        }
        if let Some(end) = definition.end_date {
            if end < definition.start_date {
                return Err(BlueprintError::EndBeforeStart {
                    start: definition.start_date,
                    end,
                });
            }
        }
        let tags = definition
            .tags
            .iter()
            .map(|t| validate_tag(t))
            .collect::<Result<Vec<_>, _>>()?;
        for template in &definition.subtasks {
            if template.title.trim().is_empty() {
                return Err(TaskError::EmptyTitle.into());
            }
            for tag in &template.tags {
                validate_tag(tag)?;
            }
            if let Some(hours) = template.estimated_hours {
                validate_hours("estimate", hours)?;
            }
        }

        Ok(Self {
            id: BlueprintId::new(&definition.title_pattern, Utc::now()),
            title_pattern: definition.title_pattern.trim().to_string(),
            category: definition.category,
            interval_days: definition.interval_days,
            start_date: definition.start_date,
            end_date: definition.end_date,
            priority: definition.priority.unwrap_or_default(),
            description: definition.description,
            tags,
            subtasks: definition.subtasks,
            cursor: None,
            generated: Vec::new(),
            active: true,
        })
    }

    /// Stops all future generation; cannot be undone
    pub fn deactivate(&mut self) {
        if self.active {
            info!(blueprint = %self.id, "blueprint deactivated");
        }
        self.active = false;
    }

    /// Title for occurrence number `n` (1-based)
    pub fn title_for(&self, n: usize) -> String {
        self.title_pattern.replace("{n}", &n.to_string())
    }

    /// Date of the next occurrence that has not been produced yet
    pub fn next_occurrence(&self) -> Date {
        self.cursor.unwrap_or(self.start_date) + self.interval()
    }

    fn interval(&self) -> i64 {
        i64::from(self.interval_days.max(1))
    }

    /// Produces every occurrence due up to `today`
    ///
    /// The first occurrence falls one interval after the start date. Each
    /// occurrence's parent is due one interval after the occurrence date;
    /// subtasks are due relative to the parent. The tasks of a run are
    /// inserted as one batch and the manager reconciles once at the end.
    /// Returns the parent IDs, oldest first.
    pub fn generate_due_tasks(
        &mut self,
        manager: &mut TodoManager,
        today: Date,
    ) -> Result<Vec<TaskId>, BlueprintError> {
        if !self.active || today < self.start_date {
            return Ok(Vec::new());
        }

        let interval = self.interval();
        let mut produced = Vec::new();
        let result = loop {
            let occurrence = self.next_occurrence();
            if self.end_date.is_some_and(|end| occurrence > end) {
                self.deactivate();
                break Ok(());
            }
            if occurrence > today {
                break Ok(());
            }
            match self.stamp(manager, occurrence + interval, today) {
                Ok(parent) => {
                    info!(blueprint = %self.id, task = %parent, %occurrence, "generated occurrence");
                    self.cursor = Some(occurrence);
                    self.generated.push(parent.clone());
                    produced.push(parent);
                }
                Err(err) => break Err(err),
            }
        };

        if !produced.is_empty() {
            manager.reconcile(today);
        }
        result.map(|()| produced)
    }

    /// Inserts one occurrence (parent plus subtasks) without reconciling
    ///
    /// Every task is built and checked before the first insert, so a bad
    /// template leaves the graph untouched.
    fn stamp(
        &self,
        manager: &mut TodoManager,
        deadline: Date,
        today: Date,
    ) -> Result<TaskId, BlueprintError> {
        let graph = manager.graph_mut();
        let title = self.title_for(self.generated.len() + 1);

        let mut parent = Task::new(
            graph.unused_id(&title),
            title,
            self.category,
            today,
            deadline,
        )
        .with_priority(self.priority)
        .with_tags(&self.tags)?
        .from_blueprint(self.id.clone());
        parent.description = self.description.clone();
        parent.is_project = !self.subtasks.is_empty();

        let mut subtasks = Vec::with_capacity(self.subtasks.len());
        for template in &self.subtasks {
            let mut subtask = Task::new(
                graph.unused_id(&template.title),
                template.title.clone(),
                self.category,
                today,
                deadline + template.offset_days,
            )
            .with_priority(template.priority.unwrap_or(self.priority))
            .with_tags(&template.tags)?
            .from_blueprint(self.id.clone());
            subtask.description = template.description.clone();
            subtask.estimated_hours = template
                .estimated_hours
                .map(|hours| validate_hours("estimate", hours))
                .transpose()?;
            subtasks.push(subtask);
        }

        let parent_id = parent.id.clone();
        graph.insert(parent);
        for subtask in subtasks {
            let subtask_id = subtask.id.clone();
            graph.insert(subtask);
            graph.add_dependency(&parent_id, &subtask_id)?;
        }

        Ok(parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> Date {
        Date::new(2025, 10, 1).unwrap() + n
    }

    fn definition() -> BlueprintDefinition {
        BlueprintDefinition {
            title_pattern: "Sheet {n}".to_string(),
            category: Category::University,
            interval_days: 7,
            start_date: day(0),
            end_date: None,
            priority: Some(Priority::Important),
            description: None,
            tags: vec!["math".to_string()],
            subtasks: vec![
                SubtaskTemplate::new("Read lecture", -3),
                SubtaskTemplate::new("Solve exercises", -1),
            ],
        }
    }

    fn titles(manager: &TodoManager, ids: &[TaskId]) -> Vec<String> {
        ids.iter()
            .map(|id| manager.graph().get(id).unwrap().title.clone())
            .collect()
    }

    #[test]
    fn rejects_invalid_definitions() {
        let mut def = definition();
        def.interval_days = 0;
        assert_eq!(
            Blueprint::from_definition(def).unwrap_err(),
            BlueprintError::InvalidInterval(0)
        );

        let mut def = definition();
        def.end_date = Some(day(-1));
        assert!(matches!(
            Blueprint::from_definition(def),
            Err(BlueprintError::EndBeforeStart { .. })
        ));

        let mut def = definition();
        def.tags = vec!["University".to_string()];
        assert!(matches!(
            Blueprint::from_definition(def),
            Err(BlueprintError::Task(TaskError::InvalidTag(_)))
        ));
    }

    #[test]
    fn produces_exactly_the_missing_occurrences() {
        let mut manager = TodoManager::new();
        let mut blueprint = Blueprint::from_definition(definition()).unwrap();

        let ids = blueprint.generate_due_tasks(&mut manager, day(20)).unwrap();

        assert_eq!(titles(&manager, &ids), ["Sheet 1", "Sheet 2"]);
        assert_eq!(blueprint.cursor, Some(day(14)));
        assert_eq!(manager.graph().get(&ids[0]).unwrap().deadline, day(14));
        assert_eq!(manager.graph().get(&ids[1]).unwrap().deadline, day(21));
        assert_eq!(manager.graph().len(), 6);
    }

    #[test]
    fn rerun_never_duplicates() {
        let mut manager = TodoManager::new();
        let mut blueprint = Blueprint::from_definition(definition()).unwrap();

        blueprint.generate_due_tasks(&mut manager, day(20)).unwrap();
        assert!(blueprint
            .generate_due_tasks(&mut manager, day(20))
            .unwrap()
            .is_empty());
        assert!(blueprint
            .generate_due_tasks(&mut manager, day(15))
            .unwrap()
            .is_empty());

        let ids = blueprint.generate_due_tasks(&mut manager, day(21)).unwrap();
        assert_eq!(titles(&manager, &ids), ["Sheet 3"]);
        assert_eq!(blueprint.generated.len(), 3);
    }

    #[test]
    fn nothing_before_start() {
        let mut manager = TodoManager::new();
        let mut def = definition();
        def.start_date = day(30);
        let mut blueprint = Blueprint::from_definition(def).unwrap();

        assert!(blueprint
            .generate_due_tasks(&mut manager, day(20))
            .unwrap()
            .is_empty());
        assert!(blueprint.cursor.is_none());
    }

    #[test]
    fn subtasks_are_fresh_and_linked() {
        let mut manager = TodoManager::new();
        let mut blueprint = Blueprint::from_definition(definition()).unwrap();

        let ids = blueprint.generate_due_tasks(&mut manager, day(7)).unwrap();
        let parent = manager.graph().get(&ids[0]).unwrap();

        assert!(parent.is_project);
        assert_eq!(parent.priority, Priority::Important);
        assert_eq!(parent.blueprint.as_ref(), Some(&blueprint.id));
        assert_eq!(parent.dependencies().len(), 2);

        let read = manager.graph().get(&parent.dependencies()[0]).unwrap();
        assert_eq!(read.title, "Read lecture");
        assert_eq!(read.deadline, parent.deadline - 3);
        assert_eq!(read.dependants(), [parent.id.clone()]);
        assert!(read.is_leaf());
        assert!(manager.graph().integrity().is_clean());
    }

    #[test]
    fn end_date_stops_generation() {
        let mut manager = TodoManager::new();
        let mut def = definition();
        def.end_date = Some(day(16));
        let mut blueprint = Blueprint::from_definition(def).unwrap();

        let ids = blueprint.generate_due_tasks(&mut manager, day(60)).unwrap();

        assert_eq!(ids.len(), 2);
        assert!(!blueprint.active);
        assert!(blueprint
            .generate_due_tasks(&mut manager, day(90))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn template_free_blueprint_makes_plain_tasks() {
        let mut manager = TodoManager::new();
        let mut def = definition();
        def.subtasks.clear();
        let mut blueprint = Blueprint::from_definition(def).unwrap();

        let ids = blueprint.generate_due_tasks(&mut manager, day(7)).unwrap();
        let task = manager.graph().get(&ids[0]).unwrap();

        assert!(!task.is_project);
        assert!(!task.is_done());
    }

    #[test]
    fn deactivated_blueprint_is_inert() {
        let mut manager = TodoManager::new();
        let mut blueprint = Blueprint::from_definition(definition()).unwrap();
        blueprint.deactivate();

        assert!(blueprint
            .generate_due_tasks(&mut manager, day(30))
            .unwrap()
            .is_empty());
        assert!(manager.graph().is_empty());
    }

    #[test]
    fn bad_stored_template_leaves_graph_untouched() {
        let mut manager = TodoManager::new();
        let mut blueprint = Blueprint::from_definition(definition()).unwrap();
        // Stored blueprints are read back without going through from_definition
        blueprint.subtasks[1].tags = vec!["Band".to_string()];

        let result = blueprint.generate_due_tasks(&mut manager, day(7));

        assert!(matches!(
            result,
            Err(BlueprintError::Task(TaskError::InvalidTag(_)))
        ));
        assert!(manager.graph().is_empty());
        assert!(blueprint.cursor.is_none());
        assert!(blueprint.generated.is_empty());
    }

    #[test]
    fn parses_yaml_definitions() {
        let yaml = r#"
blueprints:
  - title_pattern: "Sheet {n}"
    category: University
    interval_days: 7
    start_date: "10-01-2025"
    priority: important
    tags: [math]
    subtasks:
      - title: Read lecture
        offset_days: -3
"#;
        let file: BlueprintFile = serde_yaml::from_str(yaml).unwrap();
        let blueprint = Blueprint::from_definition(file.blueprints[0].clone()).unwrap();

        assert_eq!(blueprint.interval_days, 7);
        assert_eq!(blueprint.priority, Priority::Important);
        assert_eq!(blueprint.subtasks[0].offset_days, -3);
    }
}
