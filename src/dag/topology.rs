// src/dag/topology.rs

//! In-degree bookkeeping for one node set.
//!
//! This is pure data: no locks, no Tokio. The engine computes a
//! [`Topology`] during preparation and each run works on its own copy of
//! the in-degree table.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::debug;

use crate::dag::node::Node;
use crate::errors::{FieldflowError, Result};
use crate::types::TaskName;

#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// task → number of distinct tasks it waits for.
    pub in_degree: HashMap<TaskName, usize>,
    /// Tasks with nothing to wait for, sorted by name.
    pub ready: Vec<TaskName>,
    /// task → tasks that list it as a dependency.
    dependents: HashMap<TaskName, Vec<TaskName>>,
}

impl Topology {
    /// Compute in-degrees and the ready-queue, then simulate a full
    /// topological consumption to prove every node can run.
    ///
    /// A node set where some nodes never reach in-degree zero contains a
    /// cycle; that is reported as `DagCycle` with the stuck tasks. A
    /// dependency on a task missing from the set is a `ConfigError`.
    pub fn prepare(nodes: &BTreeMap<TaskName, Node>) -> Result<Self> {
        let mut in_degree: HashMap<TaskName, usize> = HashMap::with_capacity(nodes.len());
        let mut dependents: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
        let mut ready = Vec::new();

        for (name, node) in nodes {
            let deps: BTreeSet<&TaskName> = node.dep_tasks.iter().collect();
            for dep in &deps {
                if !nodes.contains_key(*dep) {
                    return Err(FieldflowError::ConfigError(format!(
                        "task '{name}' depends on task '{dep}', which is not part of this graph"
                    )));
                }
                dependents
                    .entry((*dep).clone())
                    .or_default()
                    .push(name.clone());
            }
            in_degree.insert(name.clone(), deps.len());
            if deps.is_empty() {
                ready.push(name.clone());
            }
        }

        // Simulate on a scratch copy; the real table must stay intact for runs.
        let mut remaining = in_degree.clone();
        let mut queue: VecDeque<&TaskName> = ready.iter().collect();
        let mut processed = 0usize;

        while let Some(current) = queue.pop_front() {
            processed += 1;
            for dependent in dependents.get(current).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if processed < nodes.len() {
            let mut stuck: Vec<&str> = remaining
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(name, _)| name.as_str())
                .collect();
            stuck.sort_unstable();
            return Err(FieldflowError::DagCycle(format!(
                "{} of {} tasks can never become ready: {}",
                nodes.len() - processed,
                nodes.len(),
                stuck.join(", ")
            )));
        }

        debug!(
            tasks = nodes.len(),
            ready = ?ready,
            "topology prepared"
        );

        Ok(Self {
            in_degree,
            ready,
            dependents,
        })
    }

    pub fn dependents_of(&self, task: &str) -> &[TaskName] {
        self.dependents
            .get(task)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.in_degree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_degree.is_empty()
    }
}
