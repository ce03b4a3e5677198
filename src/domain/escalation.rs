//! Deadline-driven priority escalation
//!
//! Open tasks move one rank toward `blocking` at three thresholds of days
//! left: 3 days, 1 day, and one day overdue. A per-task counter records how
//! many thresholds have fired, so each fires at most once.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::date::Date;
use super::graph::TaskGraph;
use super::task::Task;

/// Days-left values at which a task escalates, in firing order
pub const THRESHOLDS: [i64; 3] = [3, 1, -1];

/// When thresholds fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscalationMode {
    /// Fire every threshold already passed but not yet fired, so a run
    /// that skipped days still catches up
    #[default]
    CatchUp,
    /// Fire only on the exact day a threshold is reached
    Exact,
}

/// Escalates one task; returns the number of thresholds fired
pub fn escalate(task: &mut Task, today: Date, mode: EscalationMode) -> u8 {
    if task.is_done() {
        return 0;
    }
    let days_left = task.days_left(today);
    let mut fired = 0;

    match mode {
        EscalationMode::CatchUp => {
            while let Some(threshold) = THRESHOLDS.get(usize::from(task.escalations)) {
                if days_left > *threshold {
                    break;
                }
                task.priority = task.priority.escalated();
                task.escalations += 1;
                fired += 1;
            }
        }
        EscalationMode::Exact => {
            let due = THRESHOLDS
                .iter()
                .position(|threshold| *threshold == days_left)
                .filter(|index| *index >= usize::from(task.escalations));
            if let Some(index) = due {
                task.priority = task.priority.escalated();
                // Thresholds skipped on the way count as spent
                task.escalations = (index + 1) as u8;
                fired = 1;
            }
        }
    }

    if fired > 0 {
        debug!(task = %task.id, priority = %task.priority, fired, "escalated priority");
    }
    fired
}

impl TaskGraph {
    /// Escalates every open task; returns how many tasks changed priority
    pub fn escalate_priorities(&mut self, today: Date, mode: EscalationMode) -> usize {
        let mut changed = 0;
        for id in self.ids() {
            if let Some(task) = self.get_mut(&id) {
                if escalate(task, today, mode) > 0 {
                    changed += 1;
                }
            }
        }
        changed
    }
}
