//! Completion propagation
//!
//! Completing a task may complete the projects waiting on it; reopening a
//! task reopens everything above it that had moved on. Reconciliation
//! restores "a project is done iff all its dependencies are done" across the
//! whole arena.
//!
//! Every cascade carries a call-local visited set, so each task is handled
//! at most once per call even on a damaged graph.

use std::collections::HashSet;

use tracing::debug;

use super::date::Date;
use super::graph::TaskGraph;
use super::id::TaskId;

impl TaskGraph {
    /// Marks a task done and completes any project it unblocks
    ///
    /// No-op (returns false) if the task is already done or still has open
    /// dependencies.
    pub fn mark_done(&mut self, id: &TaskId, actual_hours: Option<f64>, today: Date) -> bool {
        let mut visited = HashSet::new();
        self.complete_cascade(id, actual_hours, today, &mut visited)
    }

    fn complete_cascade(
        &mut self,
        id: &TaskId,
        actual_hours: Option<f64>,
        today: Date,
        visited: &mut HashSet<TaskId>,
    ) -> bool {
        if !visited.insert(id.clone()) {
            return false;
        }
        let open = self.get(id).is_some_and(|t| !t.is_done());
        if !open || !self.is_unblocked(id) {
            return false;
        }

        let dependants = match self.get_mut(id) {
            Some(task) => {
                task.complete(today, actual_hours);
                task.dependants.clone()
            }
            None => return false,
        };
        debug!(task = %id, ?actual_hours, "marked done");

        for parent in dependants {
            let eligible = self.get(&parent).is_some_and(|p| p.is_project)
                && self.is_unblocked(&parent);
            if eligible {
                let hours = self.dependency_hours(&parent);
                self.complete_cascade(&parent, Some(hours), today, visited);
            }
        }
        true
    }

    /// Reopens a task and every dependant that is done or in progress
    ///
    /// Always clears the task's own completion state. Returns true if any
    /// task changed.
    pub fn mark_undone(&mut self, id: &TaskId) -> bool {
        let mut visited = HashSet::new();
        self.reopen_cascade(id, &mut visited)
    }

    fn reopen_cascade(&mut self, id: &TaskId, visited: &mut HashSet<TaskId>) -> bool {
        if !visited.insert(id.clone()) {
            return false;
        }
        let (mut changed, dependants) = match self.get_mut(id) {
            Some(task) => (task.reopen(), task.dependants.clone()),
            None => return false,
        };
        if changed {
            debug!(task = %id, "marked undone");
        }

        for parent in dependants {
            let active = self
                .get(&parent)
                .is_some_and(|p| p.is_done() || p.is_in_progress());
            if active {
                changed |= self.reopen_cascade(&parent, visited);
            }
        }
        changed
    }

    /// Reopens the task (cascading upward) and marks it in progress
    pub fn set_in_progress(&mut self, id: &TaskId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.mark_undone(id);
        let started = self.get_mut(id).is_some_and(|task| task.start());
        if started {
            debug!(task = %id, "started");
        }
        started
    }

    /// Restores consistency between completion state and dependencies
    ///
    /// Done tasks with open dependencies are reopened; open projects whose
    /// dependencies are all done are completed. Returns the number of
    /// corrective actions taken (zero on a consistent graph).
    pub fn reconcile(&mut self, today: Date) -> usize {
        let mut corrections = 0;

        for id in self.ids() {
            let Some(task) = self.get(&id) else {
                continue;
            };
            let done = task.is_done();
            let is_project = task.is_project;
            let unblocked = self.is_unblocked(&id);

            if done && !unblocked {
                debug!(task = %id, "reconcile: reopening task with open dependencies");
                self.mark_undone(&id);
                corrections += 1;
            } else if !done && is_project && unblocked {
                debug!(task = %id, "reconcile: completing unblocked project");
                let hours = self.dependency_hours(&id);
                self.mark_done(&id, Some(hours), today);
                corrections += 1;
            }
        }

        corrections
    }
}
