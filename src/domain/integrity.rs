//! Structural integrity check
//!
//! Read-only validation of the graph shape: mutual-inverse edges, no
//! dangling references, at most one dependant per task, no cycles. Works on
//! raw edge lists as well as on a live [`TaskGraph`], so damaged files can be
//! inspected before they are relinked.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::graph::TaskGraph;
use super::id::TaskId;

/// Edge lists of one task as stored
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'a> {
    pub id: &'a TaskId,
    pub dependencies: &'a [TaskId],
    pub dependants: &'a [TaskId],
}

/// A `parent -> child` edge
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub parent: TaskId,
    pub child: TaskId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    /// Each entry is one strongly connected component
    pub cycles: Vec<Vec<TaskId>>,

    /// Edges recorded on only one end
    pub one_sided: Vec<Edge>,

    /// `(task, missing reference)` pairs
    pub dangling: Vec<(TaskId, TaskId)>,

    /// Tasks with more than one dependant
    pub multiple_parents: Vec<TaskId>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty()
            && self.one_sided.is_empty()
            && self.dangling.is_empty()
            && self.multiple_parents.is_empty()
    }

    /// Human-readable problem list
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        for cycle in &self.cycles {
            let ids: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            out.push(format!("cycle: {}", ids.join(" -> ")));
        }
        for edge in &self.one_sided {
            out.push(format!(
                "one-sided edge: {} -> {}",
                edge.parent, edge.child
            ));
        }
        for (task, missing) in &self.dangling {
            out.push(format!("{} references missing task {}", task, missing));
        }
        for task in &self.multiple_parents {
            out.push(format!("{} has more than one dependant", task));
        }
        out
    }
}

/// Inspects a set of tasks given by their stored edge lists
pub fn inspect<'a>(views: impl IntoIterator<Item = EdgeView<'a>>) -> IntegrityReport {
    let views: Vec<EdgeView<'a>> = views.into_iter().collect();
    let mut report = IntegrityReport::default();

    let mut graph: DiGraph<TaskId, ()> = DiGraph::new();
    let mut node_map: HashMap<&TaskId, NodeIndex> = HashMap::new();
    for view in &views {
        node_map
            .entry(view.id)
            .or_insert_with(|| graph.add_node(view.id.clone()));
    }

    let stored: HashMap<&TaskId, &EdgeView<'a>> = views.iter().map(|v| (v.id, v)).collect();
    let mut edges: BTreeSet<Edge> = BTreeSet::new();
    let mut parents: HashMap<&TaskId, BTreeSet<&TaskId>> = HashMap::new();

    for view in &views {
        for child in view.dependencies {
            match stored.get(child) {
                None => report.dangling.push((view.id.clone(), child.clone())),
                Some(other) => {
                    if !other.dependants.contains(view.id) {
                        edges.insert(Edge {
                            parent: view.id.clone(),
                            child: child.clone(),
                        });
                    }
                    parents.entry(child).or_default().insert(view.id);
                    graph.update_edge(node_map[view.id], node_map[child], ());
                }
            }
        }
        for parent in view.dependants {
            match stored.get(parent) {
                None => report.dangling.push((view.id.clone(), parent.clone())),
                Some(other) => {
                    if !other.dependencies.contains(view.id) {
                        edges.insert(Edge {
                            parent: parent.clone(),
                            child: view.id.clone(),
                        });
                    }
                    parents.entry(view.id).or_default().insert(parent);
                    graph.update_edge(node_map[parent], node_map[view.id], ());
                }
            }
        }
    }
    report.one_sided = edges.into_iter().collect();

    let mut multiple: Vec<TaskId> = parents
        .into_iter()
        .filter(|(_, set)| set.len() > 1)
        .map(|(id, _)| id.clone())
        .collect();
    multiple.sort();
    report.multiple_parents = multiple;

    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|idx| graph.find_edge(*idx, *idx).is_some());
        if is_cycle {
            report
                .cycles
                .push(component.iter().map(|idx| graph[*idx].clone()).collect());
        }
    }

    report
}

impl TaskGraph {
    /// Runs the integrity check over the live arena
    pub fn integrity(&self) -> IntegrityReport {
        inspect(self.iter().map(|task| EdgeView {
            id: &task.id,
            dependencies: task.dependencies(),
            dependants: task.dependants(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::tests::add;
    use chrono::Utc;
    use proptest::prelude::*;

    fn ids(n: usize) -> Vec<TaskId> {
        (0..n).map(|i| TaskId::new(&format!("t{i}"), Utc::now())).collect()
    }

    fn view<'a>(id: &'a TaskId, deps: &'a [TaskId], dependants: &'a [TaskId]) -> EdgeView<'a> {
        EdgeView {
            id,
            dependencies: deps,
            dependants,
        }
    }

    #[test]
    fn consistent_edges_are_clean() {
        let ids = ids(2);
        let a_deps = [ids[1].clone()];
        let b_parents = [ids[0].clone()];

        let report = inspect([view(&ids[0], &a_deps, &[]), view(&ids[1], &[], &b_parents)]);
        assert!(report.is_clean(), "{:?}", report.problems());
    }

    #[test]
    fn detects_one_sided_and_dangling_edges() {
        let ids = ids(3);
        let a_deps = [ids[1].clone(), ids[2].clone()];

        let report = inspect([view(&ids[0], &a_deps, &[]), view(&ids[1], &[], &[])]);

        assert_eq!(
            report.one_sided,
            vec![Edge {
                parent: ids[0].clone(),
                child: ids[1].clone()
            }]
        );
        assert_eq!(report.dangling, vec![(ids[0].clone(), ids[2].clone())]);
        assert!(!report.is_clean());
    }

    #[test]
    fn detects_cycles_and_multiple_parents() {
        let ids = ids(3);
        let a_deps = [ids[1].clone()];
        let b_deps = [ids[0].clone(), ids[2].clone()];
        let a_parents = [ids[1].clone()];
        let b_parents = [ids[0].clone()];
        let c_parents = [ids[1].clone(), ids[0].clone()];

        let report = inspect([
            view(&ids[0], &a_deps, &a_parents),
            view(&ids[1], &b_deps, &b_parents),
            view(&ids[2], &[], &c_parents),
        ]);

        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].len(), 2);
        assert_eq!(report.multiple_parents, vec![ids[2].clone()]);
    }

    #[test]
    fn live_graph_stays_clean() {
        let mut graph = TaskGraph::new();
        let a = add(&mut graph, "A");
        let b = add(&mut graph, "B");
        graph.add_dependency(&a, &b).unwrap();

        assert!(graph.integrity().is_clean());
    }

    proptest! {
        /// Any sequence of sanctioned edge insertions keeps the forest intact
        #[test]
        fn random_links_keep_invariants(
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..40)
        ) {
            let mut graph = TaskGraph::new();
            let ids: Vec<TaskId> = (0..8).map(|i| add(&mut graph, &format!("T{i}"))).collect();

            for (parent, child) in edges {
                let _ = graph.add_dependency(&ids[parent], &ids[child]);
            }

            let report = graph.integrity();
            prop_assert!(report.is_clean(), "{:?}", report.problems());
            for task in graph.iter() {
                prop_assert!(task.dependants().len() <= 1);
                prop_assert!(!graph.depends_on(&task.id, &task.id));
            }
        }
    }
}
