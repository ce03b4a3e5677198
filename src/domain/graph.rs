//! Task dependency graph
//!
//! An arena of tasks keyed by ID. Each edge is recorded on both ends:
//! `parent.dependencies` holds the child and `child.dependants` holds the
//! parent. The graph is a strict forest: a task has at most one dependant,
//! and no task depends on itself transitively.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::id::TaskId;
use super::task::{Task, TaskStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(TaskId),

    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(TaskId, TaskId),

    #[error("Task {0} already belongs to {1}")]
    AlreadyHasParent(TaskId, TaskId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Nested view of a task and everything it depends on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyNode {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub is_project: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DependencyNode>,
    /// Set when the node was already shown higher up (only possible on a
    /// damaged graph)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub repeated: bool,
}

/// The task arena
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: HashMap<TaskId, Task>,

    /// Insertion order, for stable iteration
    order: Vec<TaskId>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Mutable access for attribute edits
    ///
    /// Edges and completion state are crate-private, so this cannot break
    /// the graph shape.
    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    fn require(&self, id: &TaskId) -> Result<&Task, GraphError> {
        self.tasks
            .get(id)
            .ok_or_else(|| GraphError::TaskNotFound(id.clone()))
    }

    /// Iterates tasks in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(move |id| self.tasks.get(id))
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.order.clone()
    }

    /// Returns a task ID not used by any task in the arena
    pub fn unused_id(&self, title: &str) -> TaskId {
        loop {
            let id = TaskId::new(title, Utc::now());
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Inserts a task; returns false if its ID is already present
    ///
    /// Any edges on the incoming task are dropped. Edges are created only
    /// through [`TaskGraph::add_dependency`].
    pub fn insert(&mut self, mut task: Task) -> bool {
        if self.tasks.contains_key(&task.id) {
            return false;
        }
        task.dependencies.clear();
        task.dependants.clear();
        self.order.push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
        true
    }

    /// Removes a task after detaching all of its edges
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        self.detach(id);
        let task = self.tasks.remove(id)?;
        self.order.retain(|other| other != id);
        Some(task)
    }

    fn detach(&mut self, id: &TaskId) {
        let Some(task) = self.tasks.get(id) else {
            return;
        };
        let children = task.dependencies.clone();
        let parents = task.dependants.clone();

        for child in &children {
            self.remove_dependency(id, child);
        }
        for parent in &parents {
            self.remove_dependency(parent, id);
        }
    }

    /// Makes `parent` depend on `child`
    ///
    /// Returns `Ok(false)` if the edge already exists.
    pub fn add_dependency(&mut self, parent: &TaskId, child: &TaskId) -> Result<bool, GraphError> {
        self.require(parent)?;
        let child_task = self.require(child)?;

        if parent == child {
            return Err(GraphError::SelfDependency(parent.clone()));
        }
        if self.depends_on(child, parent) {
            return Err(GraphError::CycleDetected(parent.clone(), child.clone()));
        }
        if child_task.dependants.contains(parent) {
            return Ok(false);
        }
        if let Some(existing) = child_task.dependants.first() {
            return Err(GraphError::AlreadyHasParent(child.clone(), existing.clone()));
        }

        if let Some(task) = self.tasks.get_mut(parent) {
            if !task.dependencies.contains(child) {
                task.dependencies.push(child.clone());
            }
        }
        if let Some(task) = self.tasks.get_mut(child) {
            task.dependants.push(parent.clone());
        }
        debug!(%parent, %child, "linked dependency");
        Ok(true)
    }

    /// Removes the edge in both directions; returns false if it was absent
    pub fn remove_dependency(&mut self, parent: &TaskId, child: &TaskId) -> bool {
        let mut removed = false;
        if let Some(task) = self.tasks.get_mut(parent) {
            let before = task.dependencies.len();
            task.dependencies.retain(|id| id != child);
            removed |= task.dependencies.len() != before;
        }
        if let Some(task) = self.tasks.get_mut(child) {
            let before = task.dependants.len();
            task.dependants.retain(|id| id != parent);
            removed |= task.dependants.len() != before;
        }
        if removed {
            debug!(%parent, %child, "unlinked dependency");
        }
        removed
    }

    /// Detaches every transitive dependency of `root` and returns them
    ///
    /// The returned tasks are still in the arena; the caller decides whether
    /// to delete them. `root` keeps its own dependants.
    pub fn remove_subtree(&mut self, root: &TaskId) -> Vec<TaskId> {
        let mut visited = HashSet::new();
        let mut detached = Vec::new();
        self.detach_subtree(root, &mut visited, &mut detached);
        detached
    }

    fn detach_subtree(
        &mut self,
        id: &TaskId,
        visited: &mut HashSet<TaskId>,
        detached: &mut Vec<TaskId>,
    ) {
        if !visited.insert(id.clone()) {
            return;
        }
        let children = match self.tasks.get(id) {
            Some(task) => task.dependencies.clone(),
            None => return,
        };
        for child in children {
            self.detach_subtree(&child, visited, detached);
            self.remove_dependency(id, &child);
            if !detached.contains(&child) {
                detached.push(child);
            }
        }
    }

    /// True if every dependency is done (vacuously true for leaves)
    ///
    /// A dependency missing from the arena counts as not done. Unknown
    /// tasks are never unblocked.
    pub fn is_unblocked(&self, id: &TaskId) -> bool {
        match self.tasks.get(id) {
            Some(task) => task.dependencies.iter().all(|dep| self.is_done(dep)),
            None => false,
        }
    }

    pub fn is_done(&self, id: &TaskId) -> bool {
        self.tasks.get(id).is_some_and(Task::is_done)
    }

    /// True if `b` is reachable from `a` through dependencies
    pub fn depends_on(&self, a: &TaskId, b: &TaskId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<&TaskId> = match self.tasks.get(a) {
            Some(task) => task.dependencies.iter().collect(),
            None => return false,
        };

        while let Some(current) = stack.pop() {
            if current == b {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(task) = self.tasks.get(current) {
                stack.extend(task.dependencies.iter());
            }
        }
        false
    }

    /// Dependencies of `id` that are still open
    pub fn blocking_tasks(&self, id: &TaskId) -> Vec<&Task> {
        self.tasks
            .get(id)
            .map(|task| {
                task.dependencies
                    .iter()
                    .filter_map(|dep| self.tasks.get(dep))
                    .filter(|dep| !dep.is_done())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tasks nothing else waits on
    pub fn roots(&self) -> impl Iterator<Item = &Task> {
        self.iter().filter(|t| t.is_root())
    }

    /// Tasks that wait on nothing
    pub fn leaves(&self) -> impl Iterator<Item = &Task> {
        self.iter().filter(|t| t.is_leaf())
    }

    /// Open tasks whose dependencies are all done
    pub fn unblocked(&self) -> impl Iterator<Item = &Task> {
        self.iter()
            .filter(move |t| !t.is_done() && self.is_unblocked(&t.id))
    }

    /// Builds the nested dependency view rooted at `id`
    pub fn dependency_tree(&self, id: &TaskId) -> Option<DependencyNode> {
        let mut visited = HashSet::new();
        self.tree_node(id, &mut visited)
    }

    fn tree_node(&self, id: &TaskId, visited: &mut HashSet<TaskId>) -> Option<DependencyNode> {
        let task = self.tasks.get(id)?;
        let repeated = !visited.insert(id.clone());
        let children = if repeated {
            Vec::new()
        } else {
            task.dependencies
                .iter()
                .filter_map(|child| self.tree_node(child, visited))
                .collect()
        };

        Some(DependencyNode {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status(),
            is_project: task.is_project,
            children,
            repeated,
        })
    }

    /// Sum of the dependencies' actual hours (missing counts as zero)
    pub fn dependency_hours(&self, id: &TaskId) -> f64 {
        self.tasks
            .get(id)
            .map(|task| {
                task.dependencies
                    .iter()
                    .filter_map(|dep| self.tasks.get(dep))
                    .filter_map(Task::actual_hours)
                    .sum()
            })
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::category::Category;
    use crate::domain::date::Date;

    pub(crate) fn day(n: i64) -> Date {
        Date::new(2025, 1, 1).unwrap() + n
    }

    pub(crate) fn add(graph: &mut TaskGraph, title: &str) -> TaskId {
        let id = graph.unused_id(title);
        graph.insert(Task::new(id.clone(), title, Category::Life, day(0), day(30)));
        id
    }

    pub(crate) fn add_project(graph: &mut TaskGraph, title: &str) -> TaskId {
        let id = graph.unused_id(title);
        graph.insert(Task::new(id.clone(), title, Category::Life, day(0), day(30)).as_project());
        id
    }

    fn assert_mutual_inverse(graph: &TaskGraph) {
        for task in graph.iter() {
            for child in task.dependencies() {
                assert!(graph.get(child).unwrap().dependants().contains(&task.id));
            }
            for parent in task.dependants() {
                assert!(graph.get(parent).unwrap().dependencies().contains(&task.id));
            }
        }
    }

    #[test]
    fn empty_graph() {
        let graph = TaskGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn insert_is_noop_for_existing_id() {
        let mut graph = TaskGraph::new();
        let id = add(&mut graph, "A");
        let copy = graph.get(&id).unwrap().clone();

        assert!(!graph.insert(copy));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn add_dependency_links_both_ends() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");

        assert!(graph.add_dependency(&a, &b).unwrap());

        assert_eq!(graph.get(&a).unwrap().dependencies(), [b.clone()]);
        assert_eq!(graph.get(&b).unwrap().dependants(), [a.clone()]);
        assert_mutual_inverse(&graph);
    }

    #[test]
    fn existing_edge_is_idempotent() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");

        graph.add_dependency(&a, &b).unwrap();
        assert!(!graph.add_dependency(&a, &b).unwrap());
        assert_eq!(graph.get(&a).unwrap().dependencies().len(), 1);
    }

    #[test]
    fn self_dependency_rejected() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");

        assert_eq!(
            graph.add_dependency(&a, &a),
            Err(GraphError::SelfDependency(a.clone()))
        );
    }

    #[test]
    fn cycle_detection() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");
        let c = add(&mut graph, "C");

        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&b, &c).unwrap();

        assert!(matches!(
            graph.add_dependency(&c, &a),
            Err(GraphError::CycleDetected(_, _))
        ));
        assert!(graph.get(&c).unwrap().is_leaf());
    }

    #[test]
    fn second_parent_rejected() {
        let mut graph = TaskGraph::new();
        let p = add(&mut graph, "P");
        let q = add(&mut graph, "Q");
        let x = add(&mut graph, "X");

        graph.add_dependency(&p, &x).unwrap();
        assert_eq!(
            graph.add_dependency(&q, &x),
            Err(GraphError::AlreadyHasParent(x.clone(), p.clone()))
        );
    }

    #[test]
    fn unknown_task_returns_error() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");
        let ghost = TaskId::new("ghost", Utc::now());

        assert_eq!(
            graph.add_dependency(&a, &ghost),
            Err(GraphError::TaskNotFound(ghost.clone()))
        );
    }

    #[test]
    fn remove_dependency_is_silent_when_absent() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");

        graph.add_dependency(&a, &b).unwrap();
        assert!(graph.remove_dependency(&a, &b));
        assert!(!graph.remove_dependency(&a, &b));
        assert!(graph.get(&b).unwrap().is_root());
    }

    #[test]
    fn remove_detaches_edges() {
        let mut graph = TaskGraph::new();
        let p = add(&mut graph, "P");
        let x = add(&mut graph, "X");
        let y = add(&mut graph, "Y");
        graph.add_dependency(&p, &x).unwrap();
        graph.add_dependency(&x, &y).unwrap();

        graph.remove(&x).unwrap();

        assert!(graph.get(&p).unwrap().is_leaf());
        assert!(graph.get(&y).unwrap().is_root());
        assert_mutual_inverse(&graph);
    }

    #[test]
    fn remove_subtree_returns_all_descendants() {
        let mut graph = TaskGraph::new();
        let top = add(&mut graph, "Top");
        let p = add_project(&mut graph, "P");
        let x = add(&mut graph, "X");
        let y = add(&mut graph, "Y");
        let z = add(&mut graph, "Z");
        graph.add_dependency(&top, &p).unwrap();
        graph.add_dependency(&p, &x).unwrap();
        graph.add_dependency(&p, &y).unwrap();
        graph.add_dependency(&y, &z).unwrap();

        let detached = graph.remove_subtree(&p);

        assert_eq!(detached.len(), 3);
        for id in [&x, &y, &z] {
            assert!(detached.contains(id));
            let task = graph.get(id).unwrap();
            assert!(task.is_root() && task.is_leaf());
        }
        assert!(graph.get(&p).unwrap().is_leaf());
        assert_eq!(graph.get(&p).unwrap().dependants(), [top]);
    }

    #[test]
    fn depends_on_is_transitive() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");
        let c = add(&mut graph, "C");
        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&b, &c).unwrap();

        assert!(graph.depends_on(&a, &c));
        assert!(!graph.depends_on(&c, &a));
        assert!(!graph.depends_on(&a, &a));
    }

    #[test]
    fn queries_report_roots_leaves_and_blockers() {
        let mut graph = TaskGraph::new();
        let p = add_project(&mut graph, "P");
        let x = add(&mut graph, "X");
        let y = add(&mut graph, "Y");
        graph.add_dependency(&p, &x).unwrap();
        graph.add_dependency(&p, &y).unwrap();

        let roots: Vec<_> = graph.roots().map(|t| t.id.clone()).collect();
        let leaves: Vec<_> = graph.leaves().map(|t| t.id.clone()).collect();
        assert_eq!(roots, [p.clone()]);
        assert_eq!(leaves, [x.clone(), y.clone()]);

        assert_eq!(graph.blocking_tasks(&p).len(), 2);
        assert!(!graph.is_unblocked(&p));
        let ready: Vec<_> = graph.unblocked().map(|t| t.id.clone()).collect();
        assert_eq!(ready, [x, y]);
    }

    #[test]
    fn dependency_tree_nests_children() {
        let mut graph = TaskGraph::new();
        let p = add_project(&mut graph, "P");
        let x = add(&mut graph, "X");
        let y = add(&mut graph, "Y");
        graph.add_dependency(&p, &x).unwrap();
        graph.add_dependency(&x, &y).unwrap();

        let tree = graph.dependency_tree(&p).unwrap();
        assert_eq!(tree.title, "P");
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].children[0].id, y);
        assert!(!tree.repeated);
    }
}
