// src/catalog/registry.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::catalog::task::{RegisteredTask, TaskDef};
use crate::dag::graph::TaskGraph;
use crate::errors::{FieldflowError, Result};
use crate::exec::SharedRunnable;
use crate::types::{FieldName, TaskName};

#[derive(Debug, Default)]
struct CatalogState {
    tasks: BTreeMap<TaskName, Arc<RegisteredTask>>,
    /// field → the task that writes it.
    writers: HashMap<FieldName, TaskName>,
    /// Fields supplied by the caller rather than by any task.
    inputs: BTreeSet<FieldName>,
    /// scene id → desired output fields, in configured order.
    scenes: BTreeMap<String, Vec<FieldName>>,
}

/// Registry of tasks, field writers and scene configurations.
///
/// The catalog is an ordinary value: construct one, populate it, and hand
/// it (or an `Arc` of it) to whoever builds scene engines. All methods take
/// `&self` and serialize on one internal lock, so concurrent callers are
/// fine. Registration is expected to be rare compared to derivation.
#[derive(Debug, Default)]
pub struct Catalog {
    state: Mutex<CatalogState>,
}

/// Read-only view of the catalog, valid while its lock is held.
///
/// The resolver works on a view so that one derivation sees one
/// consistent catalog.
pub struct CatalogView<'a> {
    state: &'a CatalogState,
}

impl CatalogView<'_> {
    pub fn scene(&self, scene_id: &str) -> Option<&[FieldName]> {
        self.state.scenes.get(scene_id).map(Vec::as_slice)
    }

    pub fn writer_of(&self, field: &str) -> Option<&str> {
        self.state.writers.get(field).map(String::as_str)
    }

    pub fn task(&self, name: &str) -> Option<&Arc<RegisteredTask>> {
        self.state.tasks.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Arc<RegisteredTask>> {
        self.state.tasks.values()
    }

    pub fn is_input(&self, field: &str) -> bool {
        self.state.inputs.contains(field)
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        // Every mutation validates before it writes, so a panic elsewhere
        // cannot leave a half-applied registration behind.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a consistent read-only view of the catalog.
    pub fn read<R>(&self, f: impl FnOnce(&CatalogView<'_>) -> R) -> R {
        let state = self.lock();
        f(&CatalogView { state: &state })
    }

    /// Register a task and claim its output fields.
    ///
    /// Fails without touching the catalog if the name is taken, or if any
    /// non-external output field already has a writer. External output
    /// fields never conflict; the first task to declare one keeps the claim.
    pub fn register_task(&self, def: TaskDef, runnable: SharedRunnable) -> Result<()> {
        if def.name.trim().is_empty() {
            return Err(FieldflowError::ConfigError(
                "task name must not be empty".to_string(),
            ));
        }

        let mut state = self.lock();

        if state.tasks.contains_key(&def.name) {
            return Err(FieldflowError::DuplicateTask(def.name));
        }

        let mut claims: Vec<FieldName> = Vec::new();
        for out in &def.outputs {
            match state.writers.get(&out.name) {
                Some(writer) if !out.role.is_external() => {
                    return Err(FieldflowError::FieldConflict {
                        field: out.name.clone(),
                        writer: writer.clone(),
                        task: def.name.clone(),
                    });
                }
                Some(writer) => {
                    debug!(
                        task = %def.name,
                        field = %out.name,
                        writer = %writer,
                        "external field already claimed; keeping existing writer"
                    );
                }
                None => {
                    if !claims.contains(&out.name) {
                        claims.push(out.name.clone());
                    }
                }
            }
        }

        for field in claims {
            state.writers.insert(field, def.name.clone());
        }

        info!(
            task = %def.name,
            deps = ?def.dep_fields,
            outputs = ?def.output_names().collect::<Vec<_>>(),
            "registered task"
        );

        let name = def.name.clone();
        state
            .tasks
            .insert(name, Arc::new(RegisteredTask { def, runnable }));

        Ok(())
    }

    /// Mark a field as supplied by the caller (seeded into the data bus
    /// before a run) so derivation does not require a writer for it.
    pub fn declare_input(&self, field: impl Into<FieldName>) {
        let field = field.into();
        debug!(field = %field, "declared input field");
        self.lock().inputs.insert(field);
    }

    pub fn is_input(&self, field: &str) -> bool {
        self.lock().inputs.contains(field)
    }

    /// Associate a scene with its desired output fields. Last write wins.
    pub fn configure_scene<I, S>(&self, scene_id: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        let scene_id = scene_id.into();
        let fields: Vec<FieldName> = fields.into_iter().map(Into::into).collect();
        debug!(scene = %scene_id, fields = ?fields, "configured scene");
        self.lock().scenes.insert(scene_id, fields);
    }

    /// Desired fields of a scene, if configured.
    pub fn lookup_scene(&self, scene_id: &str) -> Option<Vec<FieldName>> {
        self.lock().scenes.get(scene_id).cloned()
    }

    /// Owned copy of every scene configuration.
    pub fn list_scenes(&self) -> BTreeMap<String, Vec<FieldName>> {
        self.lock().scenes.clone()
    }

    pub fn clear_scenes(&self) {
        self.lock().scenes.clear();
    }

    /// Drop every task, writer claim, input declaration and scene.
    pub fn clear(&self) {
        let mut state = self.lock();
        *state = CatalogState::default();
    }

    pub fn writer_of(&self, field: &str) -> Option<TaskName> {
        self.lock().writers.get(field).cloned()
    }

    pub fn task(&self, name: &str) -> Option<Arc<RegisteredTask>> {
        self.lock().tasks.get(name).cloned()
    }

    pub fn task_names(&self) -> Vec<TaskName> {
        self.lock().tasks.keys().cloned().collect()
    }

    /// Check the whole catalog's task graph for cycles.
    ///
    /// Scene derivation never loops, but a cyclic catalog can only be
    /// executed up to the cycle; this surfaces the problem at load time.
    pub fn validate(&self) -> Result<()> {
        self.read(|view| TaskGraph::from_catalog(view).ensure_acyclic())
    }
}
