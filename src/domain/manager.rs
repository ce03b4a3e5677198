//! Task manager
//!
//! Owns the task arena and the blueprints. Every operation that can change
//! the graph shape or derived completion ends with a reconciliation pass.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::blueprint::{Blueprint, BlueprintError};
use super::category::Category;
use super::date::{Date, DateError};
use super::escalation::EscalationMode;
use super::graph::{GraphError, TaskGraph};
use super::id::{BlueprintId, IdError, TaskId};
use super::integrity::{inspect, EdgeView, IntegrityReport};
use super::priority::{Priority, PriorityError};
use super::record::{TaskRecord, TaskRef};
use super::task::{validate_hours, Task, TaskError};
use super::update::TaskUpdate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("No task found matching '{0}'")]
    NotFound(String),

    #[error("{count} tasks are titled '{title}'; use an ID instead")]
    AmbiguousMatch { title: String, count: usize },

    #[error("No blueprint found matching '{0}'")]
    UnknownBlueprint(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TodoError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Blueprint(#[from] BlueprintError),

    #[error(transparent)]
    Date(#[from] DateError),

    #[error(transparent)]
    Priority(#[from] PriorityError),

    #[error(transparent)]
    Id(#[from] IdError),
}

/// Names one task by ID or exact title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(TaskId),
    Title(String),
}

impl Selector {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.parse::<TaskId>() {
            Ok(id) => Selector::Id(id),
            Err(_) => Selector::Title(s.to_string()),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<TaskId> for Selector {
    fn from(id: TaskId) -> Self {
        Selector::Id(id)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "{}", id),
            Selector::Title(title) => f.write_str(title),
        }
    }
}

/// Defaults applied to newly created tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDefaults {
    pub priority: Priority,
    pub deadline_days: i64,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            priority: Priority::default(),
            deadline_days: 7,
        }
    }
}

/// Fields for a task that does not exist yet
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub category: Category,
    pub priority: Option<Priority>,
    pub deadline: Option<Date>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub estimated_hours: Option<f64>,
    pub is_project: bool,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            category,
            priority: None,
            deadline: None,
            description: None,
            tags: Vec::new(),
            estimated_hours: None,
            is_project: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Deadline,
    Priority,
    Created,
    Title,
    Category,
}

impl SortKey {
    pub const DEFAULT: [SortKey; 2] = [SortKey::Deadline, SortKey::Priority];

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortKey::Deadline => a.deadline.cmp(&b.deadline),
            SortKey::Priority => a.priority.cmp(&b.priority),
            SortKey::Created => a.created_on.cmp(&b.created_on),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::Category => a.category.name().cmp(b.category.name()),
        }
    }
}

impl FromStr for SortKey {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deadline" => Ok(SortKey::Deadline),
            "priority" => Ok(SortKey::Priority),
            "created" | "created_on" | "created_at" => Ok(SortKey::Created),
            "title" => Ok(SortKey::Title),
            "category" => Ok(SortKey::Category),
            other => Err(TaskError::InvalidValue {
                field: "sort".to_string(),
                value: other.to_string(),
                reason: "expected deadline, priority, created, title or category".to_string(),
            }),
        }
    }
}

/// Restricts a listing; every set criterion must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub category: Option<Category>,
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    pub overdue: bool,
    /// Open tasks due within this many days
    pub upcoming: Option<i64>,
    pub in_progress: bool,
    pub unblocked: bool,
    pub roots: bool,
    pub leaves: bool,
    pub open_only: bool,
}

impl ListFilter {
    pub fn matches(&self, task: &Task, graph: &TaskGraph, today: Date) -> bool {
        if self.category.is_some_and(|c| c != task.category) {
            return false;
        }
        if self.tag.as_ref().is_some_and(|tag| !task.has_tag(tag)) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if self.overdue && !task.is_overdue(today) {
            return false;
        }
        if let Some(days) = self.upcoming {
            let left = task.days_left(today);
            if task.is_done() || left < 0 || left > days {
                return false;
            }
        }
        if self.in_progress && !task.is_in_progress() {
            return false;
        }
        if self.unblocked && (task.is_done() || !graph.is_unblocked(&task.id)) {
            return false;
        }
        if self.roots && !task.is_root() {
            return false;
        }
        if self.leaves && !task.is_leaf() {
            return false;
        }
        if self.open_only && task.is_done() {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub overall: usize,
    pub done: usize,
    pub open: usize,
    pub overdue: usize,
    pub in_progress: usize,
    pub projects: usize,
    /// Share of done tasks among non-project tasks
    pub completion_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_completion_days: Option<f64>,
}

/// What happened while relinking stored records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub tasks: usize,
    pub duplicates: usize,
    pub dangling: usize,
    pub rejected: Vec<String>,
    /// Stored values dropped because the model rejects them
    pub discarded: Vec<String>,
    pub corrections: usize,
    /// Problems in the stored edges, before relinking
    pub integrity: IntegrityReport,
}

#[derive(Debug, Clone, Default)]
pub struct TodoManager {
    graph: TaskGraph,
    blueprints: Vec<Blueprint>,
    defaults: TaskDefaults,
}

impl TodoManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: TaskDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> TaskDefaults {
        self.defaults
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Direct arena access for batch insertion; callers reconcile afterwards
    pub(crate) fn graph_mut(&mut self) -> &mut TaskGraph {
        &mut self.graph
    }

    pub fn blueprints(&self) -> &[Blueprint] {
        &self.blueprints
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.graph.get(id)
    }

    /// Adds a task unless its ID is taken, then reconciles
    pub fn add_task(&mut self, task: Task, today: Date) -> bool {
        let inserted = self.graph.insert(task);
        if inserted {
            self.reconcile(today);
        }
        inserted
    }

    /// Creates a task from a draft, applying the configured defaults
    pub fn create_task(&mut self, draft: TaskDraft, today: Date) -> Result<TaskId, TodoError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(TaskError::EmptyTitle.into());
        }
        let deadline = draft
            .deadline
            .unwrap_or(today + self.defaults.deadline_days);
        if deadline < today {
            return Err(TaskError::DeadlineInPast { deadline, today }.into());
        }

        let mut task = Task::new(
            self.graph.unused_id(title),
            title,
            draft.category,
            today,
            deadline,
        )
        .with_priority(draft.priority.unwrap_or(self.defaults.priority))
        .with_tags(&draft.tags)?;
        task.description = draft.description.filter(|d| !d.trim().is_empty());
        task.estimated_hours = draft
            .estimated_hours
            .map(|hours| validate_hours("estimate", hours))
            .transpose()?;
        task.is_project = draft.is_project;

        let id = task.id.clone();
        self.add_task(task, today);
        info!(task = %id, "created task");
        Ok(id)
    }

    pub fn find_by_title(&self, title: &str) -> Vec<&Task> {
        self.graph.iter().filter(|t| t.title == title).collect()
    }

    /// Resolves a selector to exactly one task ID
    pub fn resolve(&self, selector: &Selector) -> Result<TaskId, LookupError> {
        let title = match selector {
            Selector::Id(id) if self.graph.contains(id) => return Ok(id.clone()),
            Selector::Id(id) => id.to_string(),
            Selector::Title(title) => title.clone(),
        };

        let matches = self.find_by_title(&title);
        match matches.as_slice() {
            [] => Err(LookupError::NotFound(title)),
            [task] => Ok(task.id.clone()),
            _ => Err(LookupError::AmbiguousMatch {
                count: matches.len(),
                title,
            }),
        }
    }

    pub fn find(&self, selector: &Selector) -> Result<&Task, LookupError> {
        let id = self.resolve(selector)?;
        self.graph
            .get(&id)
            .ok_or_else(|| LookupError::NotFound(selector.to_string()))
    }

    /// Removes a task; a project takes its whole dependency subtree with it
    ///
    /// Returns the removed tasks, the selected one first.
    pub fn remove_task(&mut self, selector: &Selector, today: Date) -> Result<Vec<Task>, TodoError> {
        let id = self.resolve(selector)?;
        let is_project = self.graph.get(&id).is_some_and(|t| t.is_project);
        let subtree = if is_project {
            self.graph.remove_subtree(&id)
        } else {
            Vec::new()
        };

        let mut removed: Vec<Task> = self.graph.remove(&id).into_iter().collect();
        removed.extend(subtree.iter().filter_map(|child| self.graph.remove(child)));

        self.reconcile(today);
        info!(task = %id, removed = removed.len(), "removed task");
        Ok(removed)
    }

    /// Removes every task and blueprint
    pub fn clear(&mut self) {
        self.graph = TaskGraph::new();
        self.blueprints.clear();
    }

    /// All tasks sorted lexicographically by `keys` (stable)
    ///
    /// An empty key list sorts by deadline, then priority.
    pub fn list(&self, keys: &[SortKey], reverse: bool) -> Vec<&Task> {
        let keys = if keys.is_empty() {
            &SortKey::DEFAULT[..]
        } else {
            keys
        };
        let mut tasks: Vec<&Task> = self.graph.iter().collect();
        tasks.sort_by(|a, b| {
            let ordering = keys
                .iter()
                .map(|key| key.compare(a, b))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal);
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });
        tasks
    }

    /// Sorted listing restricted by a filter
    pub fn query(
        &self,
        filter: &ListFilter,
        keys: &[SortKey],
        reverse: bool,
        today: Date,
    ) -> Vec<&Task> {
        self.list(keys, reverse)
            .into_iter()
            .filter(|task| filter.matches(task, &self.graph, today))
            .collect()
    }

    /// Applies an attribute update, reconciling if it can change completion
    pub fn update(
        &mut self,
        selector: &Selector,
        update: &TaskUpdate,
        today: Date,
    ) -> Result<TaskId, TodoError> {
        let id = self.resolve(selector)?;
        if let Some(task) = self.graph.get_mut(&id) {
            update.apply(task)?;
        }
        let corrections = if update.affects_lifecycle() {
            self.reconcile(today)
        } else {
            0
        };
        debug!(task = %id, corrections, "updated task");
        Ok(id)
    }

    /// Moves the deadline by `days`; returns the new deadline
    pub fn extend_deadline(&mut self, selector: &Selector, days: i64) -> Result<Date, TodoError> {
        let id = self.resolve(selector)?;
        let task = self
            .graph
            .get_mut(&id)
            .ok_or_else(|| LookupError::NotFound(selector.to_string()))?;
        task.extend_deadline(days);
        Ok(task.deadline)
    }

    pub fn add_tag(&mut self, selector: &Selector, tag: &str) -> Result<bool, TodoError> {
        let id = self.resolve(selector)?;
        match self.graph.get_mut(&id) {
            Some(task) => Ok(task.add_tag(tag)?),
            None => Ok(false),
        }
    }

    pub fn remove_tag(&mut self, selector: &Selector, tag: &str) -> Result<bool, TodoError> {
        let id = self.resolve(selector)?;
        Ok(self
            .graph
            .get_mut(&id)
            .is_some_and(|task| task.remove_tag(tag)))
    }

    /// Makes `parent` depend on `child`, then reconciles
    pub fn link(
        &mut self,
        parent: &Selector,
        child: &Selector,
        today: Date,
    ) -> Result<bool, TodoError> {
        let parent = self.resolve(parent)?;
        let child = self.resolve(child)?;
        let added = self.graph.add_dependency(&parent, &child)?;
        self.reconcile(today);
        Ok(added)
    }

    /// Removes the edge `parent -> child`, then reconciles
    pub fn unlink(
        &mut self,
        parent: &Selector,
        child: &Selector,
        today: Date,
    ) -> Result<bool, TodoError> {
        let parent = self.resolve(parent)?;
        let child = self.resolve(child)?;
        let removed = self.graph.remove_dependency(&parent, &child);
        self.reconcile(today);
        Ok(removed)
    }

    /// Completes a task; false if it was already done or is still blocked
    pub fn mark_done(
        &mut self,
        selector: &Selector,
        actual_hours: Option<f64>,
        today: Date,
    ) -> Result<bool, TodoError> {
        let actual_hours = actual_hours
            .map(|hours| validate_hours("actual hours", hours))
            .transpose()?;
        let id = self.resolve(selector)?;
        Ok(self.graph.mark_done(&id, actual_hours, today))
    }

    /// Reopens a task and the dependants that moved on, then reconciles
    ///
    /// A project whose dependencies are all done cannot be reopened on its
    /// own; its completion follows from theirs.
    pub fn mark_undone(&mut self, selector: &Selector, today: Date) -> Result<bool, TodoError> {
        let id = self.settled_check(selector)?;
        let changed = self.graph.mark_undone(&id);
        self.reconcile(today);
        Ok(changed)
    }

    /// Marks a task in progress, reopening what depends on it, then reconciles
    pub fn set_in_progress(&mut self, selector: &Selector, today: Date) -> Result<bool, TodoError> {
        let id = self.settled_check(selector)?;
        let started = self.graph.set_in_progress(&id);
        self.reconcile(today);
        Ok(started)
    }

    fn settled_check(&self, selector: &Selector) -> Result<TaskId, TodoError> {
        let id = self.resolve(selector)?;
        let settled = self.graph.get(&id).is_some_and(|t| t.is_project)
            && self.graph.is_unblocked(&id);
        if settled {
            return Err(TaskError::SettledProject(id.to_string()).into());
        }
        Ok(id)
    }

    pub fn reconcile(&mut self, today: Date) -> usize {
        let corrections = self.graph.reconcile(today);
        if corrections > 0 {
            debug!(corrections, "reconciled task graph");
        }
        corrections
    }

    pub fn add_blueprint(&mut self, blueprint: Blueprint) -> BlueprintId {
        let id = blueprint.id.clone();
        info!(blueprint = %id, pattern = %blueprint.title_pattern, "added blueprint");
        self.blueprints.push(blueprint);
        id
    }

    fn blueprint_index(&self, selector: &str) -> Result<usize, LookupError> {
        let selector = selector.trim();
        let by_id = selector
            .parse::<BlueprintId>()
            .ok()
            .and_then(|id| self.blueprints.iter().position(|b| b.id == id));
        by_id
            .or_else(|| {
                self.blueprints
                    .iter()
                    .position(|b| b.title_pattern == selector)
            })
            .ok_or_else(|| LookupError::UnknownBlueprint(selector.to_string()))
    }

    /// Finds a blueprint by ID or title pattern
    pub fn find_blueprint(&self, selector: &str) -> Result<&Blueprint, LookupError> {
        let index = self.blueprint_index(selector)?;
        Ok(&self.blueprints[index])
    }

    pub fn deactivate_blueprint(&mut self, selector: &str) -> Result<BlueprintId, TodoError> {
        let index = self.blueprint_index(selector)?;
        let blueprint = &mut self.blueprints[index];
        blueprint.deactivate();
        Ok(blueprint.id.clone())
    }

    /// Runs one blueprint up to `today`
    pub fn run_blueprint(&mut self, selector: &str, today: Date) -> Result<Vec<TaskId>, TodoError> {
        let index = self.blueprint_index(selector)?;
        let mut blueprint = self.blueprints.remove(index);
        let result = blueprint.generate_due_tasks(self, today);
        self.blueprints.insert(index, blueprint);
        Ok(result?)
    }

    /// Runs every blueprint up to `today`; returns all generated parents
    pub fn run_blueprints(&mut self, today: Date) -> Result<Vec<TaskId>, TodoError> {
        let mut blueprints = std::mem::take(&mut self.blueprints);
        let mut generated = Vec::new();
        let mut failure = None;

        for blueprint in &mut blueprints {
            match blueprint.generate_due_tasks(self, today) {
                Ok(ids) => {
                    if !ids.is_empty() {
                        info!(
                            blueprint = %blueprint.id,
                            count = ids.len(),
                            "generated tasks from {}",
                            blueprint.title_pattern
                        );
                    }
                    generated.extend(ids);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        // Blueprints added while running (none today) stay after the originals
        blueprints.append(&mut self.blueprints);
        self.blueprints = blueprints;

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(generated),
        }
    }

    /// Applies deadline escalation; returns how many tasks changed priority
    pub fn escalate_priorities(&mut self, today: Date, mode: EscalationMode) -> usize {
        self.graph.escalate_priorities(today, mode)
    }

    pub fn stats(&self, today: Date) -> Stats {
        let mut stats = Stats {
            overall: 0,
            done: 0,
            open: 0,
            overdue: 0,
            in_progress: 0,
            projects: 0,
            completion_ratio: 0.0,
            average_completion_days: self.average_completion_days(None),
        };
        let mut tasks_done = 0usize;
        let mut tasks_total = 0usize;

        for task in self.graph.iter() {
            stats.overall += 1;
            if task.is_done() {
                stats.done += 1;
            } else {
                stats.open += 1;
            }
            if task.is_overdue(today) {
                stats.overdue += 1;
            }
            if task.is_in_progress() {
                stats.in_progress += 1;
            }
            if task.is_project {
                stats.projects += 1;
            } else {
                tasks_total += 1;
                if task.is_done() {
                    tasks_done += 1;
                }
            }
        }
        if tasks_total > 0 {
            stats.completion_ratio = tasks_done as f64 / tasks_total as f64;
        }
        stats
    }

    /// Mean days from creation to completion over done tasks
    ///
    /// `search` restricts to tasks whose category or one of whose tags
    /// matches (case-insensitive).
    pub fn average_completion_days(&self, search: Option<&str>) -> Option<f64> {
        let durations: Vec<i64> = self
            .graph
            .iter()
            .filter(|task| match search {
                Some(term) => {
                    task.category.name().eq_ignore_ascii_case(term.trim()) || task.has_tag(term)
                }
                None => true,
            })
            .filter_map(|task| task.completed_on().map(|done| done - task.created_on))
            .collect();

        if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
        }
    }

    /// Flat records in insertion order
    pub fn to_records(&self) -> Vec<TaskRecord> {
        self.graph
            .iter()
            .map(|task| TaskRecord::from_task(task, &self.graph))
            .collect()
    }

    /// Rebuilds a manager from stored records
    ///
    /// References resolve by ID, falling back to a unique title match.
    /// References to missing tasks are dropped, edges recorded on only one
    /// end are restored on both, and edges that would break the forest
    /// shape are rejected. Ends with a reconciliation pass.
    pub fn from_records(
        records: Vec<TaskRecord>,
        blueprints: Vec<Blueprint>,
        defaults: TaskDefaults,
        today: Date,
    ) -> (Self, LoadReport) {
        let mut manager = Self::with_defaults(defaults);
        let mut report = LoadReport {
            integrity: stored_integrity(&records),
            ..LoadReport::default()
        };
        for problem in report.integrity.problems() {
            warn!(%problem, "stored task graph is inconsistent");
        }

        for record in &records {
            let (task, discarded) = record.to_task();
            report
                .discarded
                .extend(discarded.into_iter().map(|reason| format!("{}: {}", record.id, reason)));
            if !manager.graph.insert(task) {
                warn!(task = %record.id, "skipping duplicate task record");
                report.duplicates += 1;
            }
        }

        let mut edges: Vec<(TaskId, TaskId)> = Vec::new();
        let mut seen: HashSet<(TaskId, TaskId)> = HashSet::new();
        for record in &records {
            for reference in &record.dependencies {
                match manager.resolve_ref(reference) {
                    Some(child) => {
                        let edge = (record.id.clone(), child);
                        if seen.insert(edge.clone()) {
                            edges.push(edge);
                        }
                    }
                    None => {
                        warn!(task = %record.id, missing = %reference.title, "dropping dangling dependency");
                        report.dangling += 1;
                    }
                }
            }
            for reference in &record.dependants {
                match manager.resolve_ref(reference) {
                    Some(parent) => {
                        let edge = (parent, record.id.clone());
                        if seen.insert(edge.clone()) {
                            edges.push(edge);
                        }
                    }
                    None => {
                        warn!(task = %record.id, missing = %reference.title, "dropping dangling dependant");
                        report.dangling += 1;
                    }
                }
            }
        }

        for (parent, child) in edges {
            if let Err(err) = manager.graph.add_dependency(&parent, &child) {
                warn!(%err, "rejecting stored dependency");
                report.rejected.push(err.to_string());
            }
        }

        manager.blueprints = blueprints;
        report.tasks = manager.graph.len();
        report.corrections = manager.reconcile(today);
        info!(
            tasks = report.tasks,
            blueprints = manager.blueprints.len(),
            corrections = report.corrections,
            "loaded tasks"
        );
        (manager, report)
    }

    fn resolve_ref(&self, reference: &TaskRef) -> Option<TaskId> {
        if let Some(id) = &reference.id {
            if self.graph.contains(id) {
                return Some(id.clone());
            }
        }
        match self.find_by_title(&reference.title).as_slice() {
            [task] => Some(task.id.clone()),
            _ => None,
        }
    }
}

fn stored_integrity(records: &[TaskRecord]) -> IntegrityReport {
    fn ids(refs: &[TaskRef]) -> Vec<TaskId> {
        refs.iter().filter_map(|r| r.id.clone()).collect()
    }

    let edges: Vec<(Vec<TaskId>, Vec<TaskId>)> = records
        .iter()
        .map(|r| (ids(&r.dependencies), ids(&r.dependants)))
        .collect();
    inspect(
        records
            .iter()
            .zip(edges.iter())
            .map(|(record, (dependencies, dependants))| EdgeView {
                id: &record.id,
                dependencies,
                dependants,
            }),
    )
}
