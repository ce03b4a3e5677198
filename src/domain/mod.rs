//! Domain models for the todo CLI
//!
//! Contains the task graph and its consistency rules without any I/O concerns.

mod blueprint;
mod category;
mod date;
mod escalation;
mod graph;
mod id;
mod integrity;
mod lifecycle;
mod manager;
mod priority;
mod record;
mod task;
mod update;

pub use blueprint::{Blueprint, BlueprintDefinition, BlueprintError, BlueprintFile, SubtaskTemplate};
pub use category::Category;
pub use date::{Date, DateError};
pub use escalation::{escalate, EscalationMode, THRESHOLDS};
pub use graph::{DependencyNode, GraphError, TaskGraph};
pub use id::{BlueprintId, IdError, TaskId};
pub use integrity::{inspect, Edge, EdgeView, IntegrityReport};
pub use manager::{
    ListFilter, LoadReport, LookupError, Selector, SortKey, Stats, TaskDefaults, TaskDraft,
    TodoError, TodoManager,
};
pub use priority::{Priority, PriorityError};
pub use record::{TaskRecord, TaskRef};
pub use task::{validate_tag, Task, TaskError, TaskStatus};
pub use update::{TaskField, TaskUpdate};
