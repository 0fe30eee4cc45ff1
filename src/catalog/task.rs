// src/catalog/task.rs

//! Task definitions as registered in the catalog.

use std::fmt;

use crate::exec::SharedRunnable;
use crate::types::{FieldName, FieldRole, TaskName};

/// One output field of a task together with its role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputField {
    pub name: FieldName,
    pub role: FieldRole,
}

/// Static description of a task: what it reads and what it writes.
///
/// Built with the chained helpers:
///
/// ```
/// use fieldflow::catalog::TaskDef;
/// use fieldflow::types::FieldRole;
///
/// let def = TaskDef::new("price")
///     .depends_on(["sku"])
///     .produces(FieldRole::Result, ["price", "currency"]);
/// assert_eq!(def.output_names().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDef {
    pub name: TaskName,
    /// Fields read from the data bus before the task runs.
    pub dep_fields: Vec<FieldName>,
    /// Fields the task writes, partitioned by role.
    pub outputs: Vec<OutputField>,
}

impl TaskDef {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            dep_fields: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.dep_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn produces<I, S>(mut self, role: FieldRole, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.outputs.extend(fields.into_iter().map(|name| OutputField {
            name: name.into(),
            role,
        }));
        self
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|o| o.name.as_str())
    }

    pub fn writes(&self, field: &str) -> bool {
        self.outputs.iter().any(|o| o.name == field)
    }
}

/// A task as stored in the catalog: its definition plus its runnable.
///
/// Immutable once registered and shared by every node derived from it.
#[derive(Clone)]
pub struct RegisteredTask {
    pub def: TaskDef,
    pub runnable: SharedRunnable,
}

impl RegisteredTask {
    pub fn name(&self) -> &str {
        &self.def.name
    }
}

impl fmt::Debug for RegisteredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTask")
            .field("def", &self.def)
            .finish_non_exhaustive()
    }
}
