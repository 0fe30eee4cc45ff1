// src/config/model.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::catalog::{Catalog, TaskDef};
use crate::errors::{FieldflowError, Result};
use crate::exec::{CommandRunnable, EmitRunnable, SharedRunnable};
use crate::types::{FieldMap, FieldName, FieldRole};

/// Catalog file as read from TOML, before validation.
///
/// ```toml
/// [inputs]
/// fields = ["user_id"]
///
/// [scene.checkout]
/// fields = ["total"]
///
/// [task.price]
/// deps = ["user_id"]
/// outputs = { intermediate = ["price"] }
/// cmd = "echo '{\"price\": 10}'"
///
/// [task.total]
/// deps = ["price"]
/// outputs = { result = ["total"] }
/// emit = { total = 10 }
/// ```
///
/// All sections are optional at the TOML level; validation decides what a
/// usable catalog needs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCatalogFile {
    /// Fields supplied by the caller instead of a task, from `[inputs]`.
    #[serde(default)]
    pub inputs: InputsSection,

    /// Scenes from `[scene.<id>]`.
    #[serde(default)]
    pub scene: BTreeMap<String, SceneConfig>,

    /// Tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[inputs]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InputsSection {
    #[serde(default)]
    pub fields: Vec<FieldName>,
}

/// `[scene.<id>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SceneConfig {
    /// Desired output fields, in order.
    #[serde(default)]
    pub fields: Vec<FieldName>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Fields read before the task runs.
    #[serde(default)]
    pub deps: Vec<FieldName>,

    /// Output fields keyed by role name (`request`, `intermediate`,
    /// `result`, `external`).
    #[serde(default)]
    pub outputs: BTreeMap<String, Vec<FieldName>>,

    /// Shell command; see [`CommandRunnable`] for the JSON contract.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Fixed output values.
    #[serde(default)]
    pub emit: Option<FieldMap>,
}

impl TaskConfig {
    /// Task definition for this section, parsing role names.
    pub fn to_def(&self, name: &str) -> Result<TaskDef> {
        let mut def = TaskDef::new(name).depends_on(self.deps.iter().cloned());
        for (role, fields) in &self.outputs {
            let role: FieldRole = role.parse().map_err(|e| {
                FieldflowError::ConfigError(format!("task '{name}': {e}"))
            })?;
            def = def.produces(role, fields.iter().cloned());
        }
        Ok(def)
    }

    /// Runnable for this section. Exactly one of `cmd` / `emit` must be set.
    pub fn runnable(&self, name: &str) -> Result<SharedRunnable> {
        match (&self.cmd, &self.emit) {
            (Some(cmd), None) => Ok(Arc::new(CommandRunnable::new(cmd.clone()))),
            (None, Some(values)) => Ok(Arc::new(EmitRunnable::new(values.clone()))),
            (Some(_), Some(_)) => Err(FieldflowError::ConfigError(format!(
                "task '{name}' sets both `cmd` and `emit`; pick one"
            ))),
            (None, None) => Err(FieldflowError::ConfigError(format!(
                "task '{name}' needs either `cmd` or `emit`"
            ))),
        }
    }
}

/// A validated catalog file.
///
/// Obtained through `CatalogFile::try_from(raw)` (see `validate.rs`); the
/// only way to build one without validation is `new_unchecked`.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    pub inputs: Vec<FieldName>,
    pub scenes: BTreeMap<String, Vec<FieldName>>,
    pub tasks: BTreeMap<String, TaskConfig>,
}

impl CatalogFile {
    pub(crate) fn new_unchecked(raw: RawCatalogFile) -> Self {
        Self {
            inputs: raw.inputs.fields,
            scenes: raw
                .scene
                .into_iter()
                .map(|(id, scene)| (id, scene.fields))
                .collect(),
            tasks: raw.task,
        }
    }

    /// Register everything in this file with `catalog`.
    ///
    /// Inputs first, then tasks (in name order), then scenes. Stops at the
    /// first registration error; earlier registrations stay in place.
    pub fn populate(&self, catalog: &Catalog) -> Result<()> {
        for field in &self.inputs {
            catalog.declare_input(field.clone());
        }
        for (name, task) in &self.tasks {
            catalog.register_task(task.to_def(name)?, task.runnable(name)?)?;
        }
        for (id, fields) in &self.scenes {
            catalog.configure_scene(id.clone(), fields.iter().cloned());
        }
        Ok(())
    }

    /// Fresh catalog holding this file's contents.
    pub fn to_catalog(&self) -> Result<Catalog> {
        let catalog = Catalog::new();
        self.populate(&catalog)?;
        Ok(catalog)
    }
}
