// src/dag/graph.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::catalog::CatalogView;
use crate::dag::node::Node;
use crate::errors::{FieldflowError, Result};
use crate::types::TaskName;

/// Task-level graph used for validation and diagnostics.
///
/// Edge direction: dependency -> dependent. For a task `B` reading a field
/// written by `A` we add `A -> B`.
#[derive(Debug, Clone)]
pub struct TaskGraph<'a> {
    graph: DiGraphMap<&'a str, ()>,
}

impl<'a> TaskGraph<'a> {
    /// Graph over every task in the catalog, with edges derived from field
    /// writers. Fields without a writer contribute no edge.
    pub fn from_catalog(view: &'a CatalogView<'_>) -> Self {
        let mut graph: DiGraphMap<&'a str, ()> = DiGraphMap::new();

        for task in view.tasks() {
            graph.add_node(task.name());
        }
        for task in view.tasks() {
            for field in &task.def.dep_fields {
                if let Some(writer) = view.writer_of(field) {
                    graph.add_edge(writer, task.name(), ());
                }
            }
        }

        Self { graph }
    }

    /// Graph over a derived node set.
    pub fn from_nodes(nodes: &'a BTreeMap<TaskName, Node>) -> Self {
        let mut graph: DiGraphMap<&'a str, ()> = DiGraphMap::new();

        for name in nodes.keys() {
            graph.add_node(name.as_str());
        }
        for (name, node) in nodes {
            for dep in &node.dep_tasks {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        Self { graph }
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.graph.all_edges().map(|(from, to, _)| (from, to))
    }

    /// One valid execution order, or `DagCycle` naming a task on a cycle.
    pub fn topological_order(&self) -> Result<Vec<&'a str>> {
        toposort(&self.graph, None).map_err(|cycle| {
            FieldflowError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))
        })
    }

    pub fn ensure_acyclic(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }
}
