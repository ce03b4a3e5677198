//! Flat persisted form of a task
//!
//! Edges are written as `{id, title}` references on both ends. Loading goes
//! through [`super::manager::TodoManager::from_records`], which relinks the
//! references into live edges.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::category::Category;
use super::date::Date;
use super::graph::TaskGraph;
use super::id::{BlueprintId, TaskId};
use super::priority::Priority;
use super::task::{validate_hours, Task, TaskStatus};

/// Reference to another task by ID, with its title as a fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub title: String,
}

impl TaskRef {
    fn of(graph: &TaskGraph, id: &TaskId) -> Self {
        Self {
            id: Some(id.clone()),
            title: graph
                .get(id)
                .map(|t| t.title.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,

    pub title: String,

    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    pub created_on: Date,

    pub deadline: Date,

    #[serde(default)]
    pub is_project: bool,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<Date>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<BlueprintId>,

    #[serde(default)]
    pub escalations: u8,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependants: Vec<TaskRef>,
}

impl TaskRecord {
    pub fn from_task(task: &Task, graph: &TaskGraph) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            category: task.category,
            description: task.description.clone(),
            priority: task.priority,
            created_on: task.created_on,
            deadline: task.deadline,
            is_project: task.is_project,
            status: task.status(),
            completed_on: task.completed_on(),
            estimated_hours: task.estimated_hours,
            actual_hours: task.actual_hours(),
            tags: task.tags().to_vec(),
            blueprint: task.blueprint.clone(),
            escalations: task.escalations,
            dependencies: task
                .dependencies()
                .iter()
                .map(|id| TaskRef::of(graph, id))
                .collect(),
            dependants: task
                .dependants()
                .iter()
                .map(|id| TaskRef::of(graph, id))
                .collect(),
        }
    }

    /// Builds the task without any edges
    ///
    /// Stored values the model rejects (tags that reuse a category name,
    /// negative or non-finite hours) are dropped and described in the
    /// returned list.
    pub fn to_task(&self) -> (Task, Vec<String>) {
        let mut discarded = Vec::new();
        let mut task = Task::new(
            self.id.clone(),
            self.title.clone(),
            self.category,
            self.created_on,
            self.deadline,
        )
        .with_priority(self.priority);
        task.description = self.description.clone();
        task.is_project = self.is_project;
        task.estimated_hours = checked_hours(self.estimated_hours, "estimate", &mut discarded);
        task.blueprint = self.blueprint.clone();
        task.escalations = self.escalations;
        task.status = self.status;
        task.completed_on = self.completed_on;
        task.actual_hours = checked_hours(self.actual_hours, "actual hours", &mut discarded);
        for tag in &self.tags {
            if let Err(err) = task.add_tag(tag) {
                discarded.push(err.to_string());
            }
        }

        for reason in &discarded {
            warn!(task = %self.id, %reason, "dropping stored value");
        }
        (task, discarded)
    }
}

fn checked_hours(hours: Option<f64>, field: &str, discarded: &mut Vec<String>) -> Option<f64> {
    let hours = hours?;
    match validate_hours(field, hours) {
        Ok(hours) => Some(hours),
        Err(err) => {
            discarded.push(err.to_string());
            None
        }
    }
}
