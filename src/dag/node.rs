// src/dag/node.rs

use std::sync::Arc;

use crate::catalog::RegisteredTask;
use crate::types::{FieldName, TaskName};

/// One task's place in a scene's task graph.
///
/// Nodes are rebuilt on every derivation and hold no reference back to the
/// scene; the registered task itself is shared with the catalog.
#[derive(Debug, Clone)]
pub struct Node {
    pub task_name: TaskName,
    /// Tasks that must complete before this one runs (distinct, sorted).
    pub dep_tasks: Vec<TaskName>,
    /// Fields read from the data bus when the task runs.
    pub dep_fields: Vec<FieldName>,
    pub task: Arc<RegisteredTask>,
}

impl Node {
    /// Node for `task` with no task-level dependencies yet.
    pub fn new(task: Arc<RegisteredTask>) -> Self {
        Self {
            task_name: task.def.name.clone(),
            dep_tasks: Vec::new(),
            dep_fields: task.def.dep_fields.clone(),
            task,
        }
    }

    /// Add task-level dependencies, keeping the list distinct and sorted.
    pub fn with_dep_tasks<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.dep_tasks.extend(deps.into_iter().map(Into::into));
        self.dep_tasks.sort();
        self.dep_tasks.dedup();
        self
    }
}
