//! Task domain model
//!
//! Tasks are the nodes of the dependency graph. Edges are stored as IDs on
//! both ends (`dependencies` and `dependants`); only the graph operations in
//! [`super::graph`] and the lifecycle engine mutate them, together with the
//! completion state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::category::Category;
use super::date::Date;
use super::id::{BlueprintId, TaskId};
use super::priority::Priority;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskError {
    #[error("Invalid category '{0}'. Must be one of: Philosophy, University, Work, Sport, Band, Reading, Room, Financial, Life")]
    InvalidCategory(String),

    #[error("Invalid tag '{0}': tags must be non-empty and may not reuse a category name")]
    InvalidTag(String),

    #[error("Task title cannot be empty")]
    EmptyTitle,

    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Deadline {deadline} is before today ({today})")]
    DeadlineInPast { deadline: Date, today: Date },

    #[error("Project {0} is done because all its dependencies are done; reopen one of them instead")]
    SettledProject(String),
}

/// Status of a task
///
/// `done` and `in progress` are mutually exclusive, so a single enum covers
/// both flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// Returns true if this task is currently being worked on
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Done => "done",
        }
    }
}

/// Checks a tag and returns its trimmed form
pub fn validate_tag(tag: &str) -> Result<String, TaskError> {
    let tag = tag.trim();
    if tag.is_empty() || Category::is_category_name(tag) {
        return Err(TaskError::InvalidTag(tag.to_string()));
    }
    Ok(tag.to_string())
}

/// Checks an hours value: finite and not negative
pub fn validate_hours(field: &str, hours: f64) -> Result<f64, TaskError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(TaskError::InvalidValue {
            field: field.to_string(),
            value: hours.to_string(),
            reason: "hours must be non-negative".to_string(),
        });
    }
    Ok(hours)
}

/// A unit of work, possibly a project over other tasks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    pub category: Category,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub priority: Priority,

    pub created_on: Date,

    pub deadline: Date,

    /// Projects complete automatically once every dependency is done
    pub is_project: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    /// Blueprint that generated this task, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<BlueprintId>,

    /// Number of deadline escalation thresholds already applied
    pub escalations: u8,

    pub(crate) status: TaskStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) completed_on: Option<Date>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) actual_hours: Option<f64>,

    pub(crate) tags: Vec<String>,

    pub(crate) dependencies: Vec<TaskId>,

    pub(crate) dependants: Vec<TaskId>,
}

impl Task {
    /// Creates a new open task with no tags and no edges
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        category: Category,
        created_on: Date,
        deadline: Date,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            category,
            description: None,
            priority: Priority::default(),
            created_on,
            deadline,
            is_project: false,
            estimated_hours: None,
            blueprint: None,
            escalations: 0,
            status: TaskStatus::Todo,
            completed_on: None,
            actual_hours: None,
            tags: Vec::new(),
            dependencies: Vec::new(),
            dependants: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_estimate(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn as_project(mut self) -> Self {
        self.is_project = true;
        self
    }

    pub fn from_blueprint(mut self, blueprint: BlueprintId) -> Self {
        self.blueprint = Some(blueprint);
        self
    }

    /// Sets the tags, failing without changes if any tag is invalid
    pub fn with_tags<I, S>(mut self, tags: I) -> Result<Self, TaskError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_tags(tags)?;
        Ok(self)
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status.is_complete()
    }

    pub fn is_in_progress(&self) -> bool {
        self.status.is_active()
    }

    pub fn completed_on(&self) -> Option<Date> {
        self.completed_on
    }

    pub fn actual_hours(&self) -> Option<f64> {
        self.actual_hours
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Tasks this one waits on
    pub fn dependencies(&self) -> &[TaskId] {
        &self.dependencies
    }

    /// Tasks waiting on this one
    pub fn dependants(&self) -> &[TaskId] {
        &self.dependants
    }

    /// A root has nothing waiting on it
    pub fn is_root(&self) -> bool {
        self.dependants.is_empty()
    }

    /// A leaf waits on nothing
    pub fn is_leaf(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Past its deadline and not done
    pub fn is_overdue(&self, today: Date) -> bool {
        !self.is_done() && self.deadline < today
    }

    /// Days until the deadline (negative once overdue)
    pub fn days_left(&self, today: Date) -> i64 {
        self.deadline - today
    }

    pub fn extend_deadline(&mut self, days: i64) {
        self.deadline = self.deadline + days;
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim()))
    }

    /// Adds a tag; returns false if it was already present
    pub fn add_tag(&mut self, tag: &str) -> Result<bool, TaskError> {
        let tag = validate_tag(tag)?;
        if self.has_tag(&tag) {
            return Ok(false);
        }
        self.tags.push(tag);
        Ok(true)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| !t.eq_ignore_ascii_case(tag.trim()));
        self.tags.len() != before
    }

    /// Replaces all tags; on error the existing tags are kept
    pub fn set_tags<I, S>(&mut self, tags: I) -> Result<(), TaskError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut validated: Vec<String> = Vec::new();
        for tag in tags {
            let tag = validate_tag(tag.as_ref())?;
            if !validated.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                validated.push(tag);
            }
        }
        self.tags = validated;
        Ok(())
    }

    pub(crate) fn complete(&mut self, today: Date, actual_hours: Option<f64>) {
        self.status = TaskStatus::Done;
        self.completed_on = Some(today);
        self.actual_hours = actual_hours;
    }

    /// Clears all completion state; returns true if anything changed
    pub(crate) fn reopen(&mut self) -> bool {
        let changed = self.status != TaskStatus::Todo
            || self.completed_on.is_some()
            || self.actual_hours.is_some();
        self.status = TaskStatus::Todo;
        self.completed_on = None;
        self.actual_hours = None;
        changed
    }

    pub(crate) fn start(&mut self) -> bool {
        if self.status == TaskStatus::Todo {
            self.status = TaskStatus::InProgress;
            true
        } else {
            false
        }
    }
}
