#![allow(dead_code)]

use std::sync::Arc;

use fieldflow::catalog::{Catalog, TaskDef};
use fieldflow::config::{CatalogFile, RawCatalogFile, SceneConfig, TaskConfig};
use fieldflow::exec::{EmitRunnable, SharedRunnable};
use fieldflow::types::{FieldMap, FieldRole};

/// Builder for an in-memory `Catalog`.
///
/// Registration errors panic: builders are for catalogs the test expects to
/// be valid. Tests about conflicts call `Catalog::register_task` directly.
#[derive(Default)]
pub struct CatalogBuilder {
    inputs: Vec<String>,
    tasks: Vec<(TaskDef, SharedRunnable)>,
    scenes: Vec<(String, Vec<String>)>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, def: TaskDef, runnable: SharedRunnable) -> Self {
        self.tasks.push((def, runnable));
        self
    }

    /// Task whose runnable returns `values` regardless of its inputs.
    pub fn with_emit_task(self, def: TaskDef, values: FieldMap) -> Self {
        self.with_task(def, Arc::new(EmitRunnable::new(values)))
    }

    pub fn with_input(mut self, field: &str) -> Self {
        self.inputs.push(field.to_string());
        self
    }

    pub fn with_scene(mut self, id: &str, fields: &[&str]) -> Self {
        self.scenes
            .push((id.to_string(), fields.iter().map(|f| f.to_string()).collect()));
        self
    }

    pub fn build(self) -> Catalog {
        let catalog = Catalog::new();
        for field in self.inputs {
            catalog.declare_input(field);
        }
        for (def, runnable) in self.tasks {
            let name = def.name.clone();
            catalog
                .register_task(def, runnable)
                .unwrap_or_else(|e| panic!("failed to register task '{name}': {e}"));
        }
        for (id, fields) in self.scenes {
            catalog.configure_scene(id, fields);
        }
        catalog
    }
}

/// Shorthand for a `TaskDef` reading `deps` and producing `outputs` as
/// intermediate fields.
pub fn task(name: &str, deps: &[&str], outputs: &[&str]) -> TaskDef {
    TaskDef::new(name)
        .depends_on(deps.iter().copied())
        .produces(FieldRole::Intermediate, outputs.iter().copied())
}

/// Builder for `CatalogFile`, validated on `build`.
pub struct CatalogFileBuilder {
    raw: RawCatalogFile,
}

impl CatalogFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawCatalogFile::default(),
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.raw.task.insert(name.to_string(), task);
        self
    }

    pub fn with_input(mut self, field: &str) -> Self {
        self.raw.inputs.fields.push(field.to_string());
        self
    }

    pub fn with_scene(mut self, id: &str, fields: &[&str]) -> Self {
        self.raw.scene.insert(
            id.to_string(),
            SceneConfig {
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        );
        self
    }

    pub fn raw(self) -> RawCatalogFile {
        self.raw
    }

    pub fn build(self) -> CatalogFile {
        CatalogFile::try_from(self.raw).expect("Failed to build valid catalog file from builder")
    }
}

impl Default for CatalogFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `[task.<name>]` section.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// Task backed by a shell command.
    pub fn cmd(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Task that emits fixed values.
    pub fn emit(values: FieldMap) -> Self {
        Self {
            task: TaskConfig {
                emit: Some(values),
                ..TaskConfig::default()
            },
        }
    }

    pub fn dep(mut self, field: &str) -> Self {
        self.task.deps.push(field.to_string());
        self
    }

    pub fn output(mut self, role: FieldRole, field: &str) -> Self {
        self.task
            .outputs
            .entry(role.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
