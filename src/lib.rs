// src/lib.rs

pub mod bus;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

pub use bus::{BusSet, DEFAULT_SESSION, DataBus};
pub use catalog::{Catalog, TaskDef};
pub use engine::{EnginePhase, ExecReport, SceneEngine, build_scene_engine};
pub use errors::{FieldflowError, TaskError};
pub use exec::{Runnable, SharedRunnable, from_fn};
pub use types::{FieldMap, FieldRole, FieldValue};

use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::cli::{CliArgs, parse_input};
use crate::config::loader::load_and_validate;
use crate::dag::{TaskGraph, derive_tasks};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the catalog file, then either lists scenes, prints a
/// dry run, or builds the requested scene, seeds `--input` values and runs
/// it. Results go to stdout as pretty JSON.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let file = load_and_validate(&config_path)?;
    let catalog = file.to_catalog()?;

    info!(
        config = %config_path.display(),
        tasks = catalog.task_names().len(),
        "catalog loaded"
    );

    if args.list_scenes {
        print_scenes(&catalog);
        return Ok(());
    }

    let scene = args
        .scene
        .as_deref()
        .ok_or_else(|| anyhow!("--scene is required unless --list-scenes is given"))?;

    if args.dry_run {
        print_dry_run(&catalog, scene)?;
        return Ok(());
    }

    let engine = build_scene_engine(&catalog, scene)?;
    for arg in &args.inputs {
        let (field, value) = parse_input(arg)?;
        debug!(field = %field, "seeding input");
        engine.seed(&field, value);
    }

    let report = engine.exec().await?;
    info!(
        scene = %scene,
        completed = report.completed.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "scene finished"
    );

    let values = engine.data_bus_values();
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

fn print_scenes(catalog: &Catalog) {
    let scenes = catalog.list_scenes();
    if scenes.is_empty() {
        println!("no scenes configured");
        return;
    }
    for (id, fields) in scenes {
        println!("{id}: {}", fields.join(", "));
    }
}

/// Print the derived tasks in dependency order, with their edges.
fn print_dry_run(catalog: &Catalog, scene: &str) -> Result<()> {
    let nodes = derive_tasks(catalog, scene)?;
    let graph = TaskGraph::from_nodes(&nodes);
    let order = graph.topological_order()?;

    println!("fieldflow dry-run");
    println!("  scene = {scene}");
    if let Some(fields) = catalog.lookup_scene(scene) {
        println!("  fields = {fields:?}");
    }
    println!();

    println!("tasks ({}):", order.len());
    for name in order {
        let Some(node) = nodes.get(name) else {
            continue;
        };
        println!("  - {name}");
        if !node.dep_fields.is_empty() {
            println!("      reads: {:?}", node.dep_fields);
        }
        if !node.dep_tasks.is_empty() {
            println!("      after: {:?}", node.dep_tasks);
        }
        let outputs: Vec<&str> = node.task.def.output_names().collect();
        println!("      writes: {outputs:?}");
    }

    println!();
    println!("edges:");
    for (from, to) in graph.edges() {
        println!("  {from} -> {to}");
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
