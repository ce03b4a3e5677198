//! Attribute updates
//!
//! A closed set of editable fields. Free-form `field=value` edits from the
//! command line are parsed into a [`TaskUpdate`], so unknown attributes are
//! rejected before anything is touched.

use std::fmt;
use std::str::FromStr;

use super::category::Category;
use super::date::Date;
use super::priority::Priority;
use super::task::{validate_hours, validate_tag, Task, TaskError};

/// Editable task attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Category,
    Description,
    Priority,
    Deadline,
    Project,
    Estimate,
    Tags,
}

impl TaskField {
    pub const ALL: [TaskField; 8] = [
        TaskField::Title,
        TaskField::Category,
        TaskField::Description,
        TaskField::Priority,
        TaskField::Deadline,
        TaskField::Project,
        TaskField::Estimate,
        TaskField::Tags,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskField::Title => "title",
            TaskField::Category => "category",
            TaskField::Description => "description",
            TaskField::Priority => "priority",
            TaskField::Deadline => "deadline",
            TaskField::Project => "project",
            TaskField::Estimate => "estimate",
            TaskField::Tags => "tags",
        }
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskField {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        match key.as_str() {
            "is_project" => return Ok(TaskField::Project),
            "estimated_hours" => return Ok(TaskField::Estimate),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == key)
            .ok_or_else(|| TaskError::UnknownAttribute(s.trim().to_string()))
    }
}

/// A partial change to a task
///
/// `None` leaves a field untouched. For optional attributes the inner
/// `Option` distinguishes "clear" from "set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub category: Option<Category>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub deadline: Option<Date>,
    pub is_project: Option<bool>,
    pub estimated_hours: Option<Option<f64>>,
    pub tags: Option<Vec<String>>,
}

fn invalid(field: TaskField, value: &str, reason: impl fmt::Display) -> TaskError {
    TaskError::InvalidValue {
        field: field.name().to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(field: TaskField, value: &str) -> Result<bool, TaskError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(field, value, "expected true or false")),
    }
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true if applying this update may change derived completion
    pub fn affects_lifecycle(&self) -> bool {
        self.is_project.is_some()
    }

    /// Parses `field=value` and merges it into this update
    pub fn parse_assignment(&mut self, assignment: &str) -> Result<(), TaskError> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| TaskError::UnknownAttribute(assignment.trim().to_string()))?;
        let field: TaskField = key.parse()?;
        self.set(field, value)
    }

    /// Sets one field from its text form
    pub fn set(&mut self, field: TaskField, value: &str) -> Result<(), TaskError> {
        let trimmed = value.trim();
        match field {
            TaskField::Title => {
                if trimmed.is_empty() {
                    return Err(TaskError::EmptyTitle);
                }
                self.title = Some(trimmed.to_string());
            }
            TaskField::Category => self.category = Some(trimmed.parse()?),
            TaskField::Description => {
                self.description = Some((!trimmed.is_empty()).then(|| trimmed.to_string()));
            }
            TaskField::Priority => {
                self.priority = Some(trimmed.parse().map_err(|e| invalid(field, value, e))?);
            }
            TaskField::Deadline => {
                self.deadline = Some(trimmed.parse().map_err(|e| invalid(field, value, e))?);
            }
            TaskField::Project => self.is_project = Some(parse_bool(field, value)?),
            TaskField::Estimate => {
                let hours = if trimmed.is_empty() {
                    None
                } else {
                    let hours: f64 = trimmed
                        .parse()
                        .map_err(|_| invalid(field, value, "expected a number of hours"))?;
                    Some(validate_hours(field.name(), hours)?)
                };
                self.estimated_hours = Some(hours);
            }
            TaskField::Tags => {
                let tags = trimmed
                    .split(',')
                    .filter(|t| !t.trim().is_empty())
                    .map(validate_tag)
                    .collect::<Result<Vec<_>, _>>()?;
                self.tags = Some(tags);
            }
        }
        Ok(())
    }

    /// Applies the update; validation happens before any field changes
    pub fn apply(&self, task: &mut Task) -> Result<(), TaskError> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(TaskError::EmptyTitle);
        }
        if let Some(tags) = &self.tags {
            for tag in tags {
                validate_tag(tag)?;
            }
        }

        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        if let Some(is_project) = self.is_project {
            task.is_project = is_project;
        }
        if let Some(hours) = self.estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(tags) = &self.tags {
            task.set_tags(tags)?;
        }
        Ok(())
    }
}
