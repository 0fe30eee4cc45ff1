// src/dag/resolver.rs

//! Scene derivation: desired fields → required tasks → task graph.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, trace};

use crate::catalog::{Catalog, CatalogView};
use crate::dag::node::Node;
use crate::errors::{FieldflowError, Result};
use crate::types::{FieldName, TaskName};

/// Derive the node set for a configured scene.
///
/// Fails with `UnknownScene` if the scene is not configured and with
/// `UnwrittenField` if a field reached during the walk has no writer and
/// was not declared as an input.
pub fn derive_tasks(catalog: &Catalog, scene_id: &str) -> Result<BTreeMap<TaskName, Node>> {
    catalog.read(|view| derive_scene(view, scene_id))
}

/// Same as [`derive_tasks`], on a view the caller already holds.
pub fn derive_scene(view: &CatalogView<'_>, scene_id: &str) -> Result<BTreeMap<TaskName, Node>> {
    let desired = view
        .scene(scene_id)
        .ok_or_else(|| FieldflowError::UnknownScene(scene_id.to_string()))?;

    let nodes = derive_fields(view, desired)?;
    debug!(
        scene = %scene_id,
        tasks = ?nodes.keys().collect::<Vec<_>>(),
        "derived scene tasks"
    );
    Ok(nodes)
}

/// Derive the minimal node set producing `fields`.
///
/// Breadth-first over fields, with the "already seen" check on tasks: a
/// field may be dequeued many times, but each task's dependencies are
/// enqueued once, so the walk always terminates.
pub fn derive_fields(
    view: &CatalogView<'_>,
    fields: &[FieldName],
) -> Result<BTreeMap<TaskName, Node>> {
    let mut queue: VecDeque<&str> = fields.iter().map(String::as_str).collect();
    let mut discovered: BTreeSet<&str> = BTreeSet::new();

    while let Some(field) = queue.pop_front() {
        let Some(writer) = view.writer_of(field) else {
            if view.is_input(field) {
                trace!(field = %field, "field is a declared input; no writer needed");
                continue;
            }
            return Err(FieldflowError::UnwrittenField(field.to_string()));
        };

        if discovered.insert(writer) {
            let task = view.task(writer).ok_or_else(|| {
                FieldflowError::ConfigError(format!(
                    "field '{field}' names writer '{writer}', which is not registered"
                ))
            })?;
            trace!(field = %field, task = %writer, "discovered writer");
            queue.extend(task.def.dep_fields.iter().map(String::as_str));
        }
    }

    let mut nodes = BTreeMap::new();
    for name in discovered {
        // Present by construction: every discovered name was looked up above.
        let Some(task) = view.task(name) else { continue };

        // Fields without a writer are tolerated here: they were either
        // declared inputs or rejected during the walk.
        let deps: Vec<&str> = task
            .def
            .dep_fields
            .iter()
            .filter_map(|f| view.writer_of(f))
            .collect();

        let node = Node::new(task.clone()).with_dep_tasks(deps);
        nodes.insert(name.to_string(), node);
    }

    Ok(nodes)
}
