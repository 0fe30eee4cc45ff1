// src/engine/build.rs

use tracing::info;

use crate::catalog::Catalog;
use crate::dag::derive_scene;
use crate::engine::SceneEngine;
use crate::errors::{FieldflowError, Result};

/// Build a prepared engine for a configured scene.
///
/// Derivation and the scene lookup happen under one catalog lock, so a
/// concurrent `configure_scene` cannot make them disagree. The engine is
/// prepared before it is returned: a cyclic task graph fails the build.
pub fn build_scene_engine(catalog: &Catalog, scene_id: &str) -> Result<SceneEngine> {
    let (nodes, fields) = catalog.read(|view| {
        let nodes = derive_scene(view, scene_id)?;
        let fields = view
            .scene(scene_id)
            .map(|fields| fields.to_vec())
            .ok_or_else(|| FieldflowError::UnknownScene(scene_id.to_string()))?;
        Ok::<_, FieldflowError>((nodes, fields))
    })?;

    let engine = SceneEngine::new(fields).with_scene(scene_id);
    engine.update_tasks(nodes);
    engine.prepare()?;

    info!(
        scene = %scene_id,
        tasks = ?engine.derived_tasks(),
        outputs = ?engine.output_fields(),
        "scene engine built"
    );

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TaskDef;
    use crate::engine::EnginePhase;
    use crate::exec::{EmitRunnable, SharedRunnable};
    use crate::types::FieldRole;
    use std::sync::Arc;

    fn noop() -> SharedRunnable {
        Arc::new(EmitRunnable::default())
    }

    #[test]
    fn built_engine_is_prepared() {
        let catalog = Catalog::new();
        catalog
            .register_task(TaskDef::new("A").produces(FieldRole::Result, ["a"]), noop())
            .unwrap();
        catalog.configure_scene("s", ["a"]);

        let engine = build_scene_engine(&catalog, "s").unwrap();
        assert_eq!(engine.phase(), EnginePhase::Ready);
        assert_eq!(engine.derived_tasks(), vec!["A"]);
        assert_eq!(engine.output_fields(), ["a".to_string()]);
        assert_eq!(engine.scene(), "s");
    }

    #[test]
    fn cyclic_scene_fails_to_build() {
        let catalog = Catalog::new();
        catalog
            .register_task(
                TaskDef::new("X")
                    .depends_on(["y"])
                    .produces(FieldRole::Intermediate, ["x"]),
                noop(),
            )
            .unwrap();
        catalog
            .register_task(
                TaskDef::new("Y")
                    .depends_on(["x"])
                    .produces(FieldRole::Result, ["y"]),
                noop(),
            )
            .unwrap();
        catalog.configure_scene("s", ["y"]);

        let err = build_scene_engine(&catalog, "s").unwrap_err();
        assert!(matches!(err, FieldflowError::DagCycle(_)));
    }

    #[test]
    fn unknown_scene_fails_to_build() {
        let catalog = Catalog::new();
        let err = build_scene_engine(&catalog, "ghost").unwrap_err();
        assert!(matches!(err, FieldflowError::UnknownScene(_)));
    }
}
