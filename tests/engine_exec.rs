use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use fieldflow::bus::DataBus;
use fieldflow::catalog::TaskDef;
use fieldflow::dag::derive_tasks;
use fieldflow::engine::{EnginePhase, SceneEngine, build_scene_engine};
use fieldflow::errors::{FieldflowError, TaskError};
use fieldflow::types::{FieldMap, FieldRole};
use fieldflow_test_utils::builders::{CatalogBuilder, task};
use fieldflow_test_utils::recording::{Event, Recorder};
use fieldflow_test_utils::{fields, init_tracing, with_timeout};

fn doubling(recorder: &Recorder, name: &str, from: &'static str, to: &'static str) -> fieldflow::SharedRunnable {
    recorder.wrap(name, move |_, inputs| {
        let value = inputs
            .get(from)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| TaskError::MissingInput(from.to_string()))?;
        Ok(fields([(to, json!(value * 2))]))
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_task_chain_produces_expected_result() {
    init_tracing();
    let recorder = Recorder::new();

    let catalog = CatalogBuilder::new()
        .with_task(
            TaskDef::new("Task1").produces(FieldRole::Intermediate, ["output1"]),
            recorder.emit("Task1", fields([("output1", json!(42))])),
        )
        .with_task(
            TaskDef::new("Task2")
                .depends_on(["output1"])
                .produces(FieldRole::Result, ["output2"]),
            doubling(&recorder, "Task2", "output1", "output2"),
        )
        .with_scene("chain", &["output2"])
        .build();

    let engine = build_scene_engine(&catalog, "chain").unwrap();
    assert_eq!(engine.derived_tasks(), vec!["Task1", "Task2"]);

    let report = with_timeout(engine.exec()).await.unwrap();

    assert_eq!(report.completed, vec!["Task1", "Task2"]);
    assert_eq!(engine.phase(), EnginePhase::Completed);
    assert_eq!(engine.data_bus_values(), fields([("output2", json!(84))]));

    // The dependent saw its dependency's output when gathering inputs.
    assert!(recorder.finished_before("Task1", "Task2"));
    assert_eq!(recorder.inputs_of("Task2"), Some(fields([("output1", json!(42))])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn diamond_waits_for_both_branches() {
    init_tracing();
    let recorder = Recorder::new();
    let delay = Duration::from_millis(50);

    let catalog = CatalogBuilder::new()
        .with_task(task("A", &[], &["a"]), recorder.emit("A", fields([("a", json!(1))])))
        .with_task(
            task("B", &["a"], &["b"]),
            recorder.slow_emit("B", delay, fields([("b", json!(2))])),
        )
        .with_task(
            task("C", &["a"], &["c"]),
            recorder.slow_emit("C", delay, fields([("c", json!(3))])),
        )
        .with_task(
            TaskDef::new("D")
                .depends_on(["b", "c"])
                .produces(FieldRole::Result, ["d"]),
            recorder.wrap("D", |_, inputs| {
                let sum: i64 = inputs.values().filter_map(|v| v.as_i64()).sum();
                Ok(fields([("d", json!(sum))]))
            }),
        )
        .with_scene("diamond", &["d"])
        .build();

    let engine = build_scene_engine(&catalog, "diamond").unwrap();
    with_timeout(engine.exec()).await.unwrap();

    assert!(recorder.finished_before("B", "D"));
    assert!(recorder.finished_before("C", "D"));
    assert!(recorder.finished_before("A", "B"));
    assert_eq!(
        recorder.inputs_of("D"),
        Some(fields([("b", json!(2)), ("c", json!(3))]))
    );
    assert_eq!(engine.data_bus_values(), fields([("d", json!(5))]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_roots_run_concurrently() {
    init_tracing();
    let recorder = Recorder::new();
    let delay = Duration::from_millis(200);

    let mut builder = CatalogBuilder::new();
    for name in ["P1", "P2", "P3", "P4"] {
        let field = name.to_lowercase();
        builder = builder.with_task(
            TaskDef::new(name).produces(FieldRole::Result, [field.as_str()]),
            recorder.slow_emit(name, delay, fields([(field.as_str(), json!(true))])),
        );
    }
    let catalog = builder.with_scene("wide", &["p1", "p2", "p3", "p4"]).build();

    let engine = build_scene_engine(&catalog, "wide").unwrap();
    let report = with_timeout(engine.exec()).await.unwrap();
    assert_eq!(report.completed.len(), 4);

    // Every root was started before any of them finished.
    let events = recorder.events();
    let first_finish = events
        .iter()
        .position(|e| matches!(e, Event::Finished(_)))
        .unwrap();
    let starts: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Started(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(starts.len(), 4);
    assert!(starts.iter().all(|&i| i < first_finish), "{events:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_tasks_invalidates_prepared_topology() {
    init_tracing();
    let recorder = Recorder::new();

    let catalog = CatalogBuilder::new()
        .with_task(task("A", &[], &["a"]), recorder.emit("A", fields([("a", json!(1))])))
        .with_task(task("B", &["a"], &["b"]), recorder.emit("B", fields([("b", json!(2))])))
        .with_scene("just_a", &["a"])
        .with_scene("a_and_b", &["b"])
        .build();

    let engine = build_scene_engine(&catalog, "just_a").unwrap();
    assert!(engine.is_prepared());

    engine.update_tasks(derive_tasks(&catalog, "a_and_b").unwrap());
    assert!(!engine.is_prepared());
    assert_eq!(engine.phase(), EnginePhase::Unbuilt);
    assert_eq!(engine.derived_tasks(), vec!["A", "B"]);

    // exec prepares lazily and runs the new node set.
    let report = with_timeout(engine.exec()).await.unwrap();
    assert_eq!(report.completed, vec!["A", "B"]);
    assert!(recorder.ran("B"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cyclic_node_set_fails_preparation() {
    init_tracing();
    let catalog = CatalogBuilder::new()
        .with_emit_task(task("X", &["y"], &["x"]), FieldMap::new())
        .with_emit_task(task("Y", &["x"], &["y"]), FieldMap::new())
        .with_scene("loop", &["y"])
        .build();

    // Derivation terminates on a cyclic catalog; preparation rejects it.
    let nodes = derive_tasks(&catalog, "loop").unwrap();
    assert_eq!(nodes.len(), 2);

    let engine = SceneEngine::new(["y"]);
    engine.update_tasks(nodes);

    match with_timeout(engine.exec()).await {
        Err(FieldflowError::DagCycle(msg)) => {
            assert!(msg.contains('X') && msg.contains('Y'), "{msg}");
        }
        other => panic!("expected DagCycle, got {other:?}"),
    }
    assert_eq!(engine.phase(), EnginePhase::Unbuilt);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_stops_dependents_and_drains_running_siblings() {
    init_tracing();
    let recorder = Recorder::new();
    let sibling_started = Arc::new(AtomicBool::new(false));

    let started_flag = Arc::clone(&sibling_started);
    let sibling = recorder.wrap("Sibling", move |_, _| {
        started_flag.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(150));
        Ok(fields([("sibling", json!("done"))]))
    });

    let wait_flag = Arc::clone(&sibling_started);
    let failing = recorder.wrap("Broken", move |_, _| {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !wait_flag.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        Err(TaskError::failed("upstream unavailable"))
    });

    let catalog = CatalogBuilder::new()
        .with_task(task("Broken", &[], &["broken"]), failing)
        .with_task(task("Sibling", &[], &["sibling"]), sibling)
        .with_task(
            task("Dependent", &["broken"], &["dependent"]),
            recorder.emit("Dependent", fields([("dependent", json!(1))])),
        )
        .with_scene("mixed", &["dependent", "sibling"])
        .build();

    let engine = build_scene_engine(&catalog, "mixed").unwrap();
    let err = with_timeout(engine.exec()).await.unwrap_err();

    match err {
        FieldflowError::TaskFailed {
            task,
            source,
            completed,
        } => {
            assert_eq!(task, "Broken");
            assert!(matches!(source, TaskError::Failed(ref m) if m == "upstream unavailable"));
            assert_eq!(completed, vec!["Sibling"]);
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }

    assert!(!recorder.ran("Dependent"));
    assert_eq!(engine.phase(), EnginePhase::Failed);
    // The bus is left intact: the sibling's output survives the failure.
    assert_eq!(engine.data_bus_values(), fields([("sibling", json!("done"))]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_root_never_runs_its_dependents() {
    init_tracing();
    let recorder = Recorder::new();
    let catalog = CatalogBuilder::new()
        .with_task(task("Root", &[], &["root"]), recorder.failing("Root", "no data"))
        .with_task(
            task("Child", &["root"], &["child"]),
            recorder.emit("Child", fields([("child", json!(1))])),
        )
        .with_scene("s", &["child"])
        .build();

    let engine = build_scene_engine(&catalog, "s").unwrap();
    match with_timeout(engine.exec()).await {
        Err(FieldflowError::TaskFailed {
            task, completed, ..
        }) => {
            assert_eq!(task, "Root");
            assert!(completed.is_empty());
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }

    assert_eq!(recorder.started(), vec!["Root"]);
    assert!(engine.data_bus_values().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_task_is_reported_as_failure() {
    init_tracing();
    let catalog = CatalogBuilder::new()
        .with_task(
            task("Boom", &[], &["boom"]),
            fieldflow::from_fn(|_, _| panic!("kaboom")),
        )
        .with_scene("s", &["boom"])
        .build();

    let engine = build_scene_engine(&catalog, "s").unwrap();
    match with_timeout(engine.exec()).await {
        Err(FieldflowError::TaskFailed { task, source, .. }) => {
            assert_eq!(task, "Boom");
            assert!(matches!(source, TaskError::Panicked(ref m) if m.contains("kaboom")));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn context_and_seeded_inputs_reach_runnables() {
    init_tracing();
    let catalog = CatalogBuilder::new()
        .with_input("x")
        .with_task(
            TaskDef::new("Scale")
                .depends_on(["x"])
                .produces(FieldRole::Result, ["scaled"]),
            fieldflow::from_fn(|ctx, inputs| {
                let x = inputs
                    .get("x")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| TaskError::MissingInput("x".into()))?;
                let factor = ctx.get("factor").and_then(|v| v.as_i64()).unwrap_or(1);
                Ok(fields([("scaled", json!(x * factor))]))
            }),
        )
        .with_scene("scale", &["scaled"])
        .build();

    let engine = build_scene_engine(&catalog, "scale")
        .unwrap()
        .with_context(fields([("factor", json!(3))]));
    engine.seed("x", json!(5));

    with_timeout(engine.exec()).await.unwrap();
    assert_eq!(engine.data_bus_values(), fields([("scaled", json!(15))]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_input_surfaces_as_task_failure() {
    init_tracing();
    let recorder = Recorder::new();
    let catalog = CatalogBuilder::new()
        .with_input("x")
        .with_task(
            TaskDef::new("Double")
                .depends_on(["x"])
                .produces(FieldRole::Result, ["y"]),
            doubling(&recorder, "Double", "x", "y"),
        )
        .with_scene("s", &["y"])
        .build();

    let engine = build_scene_engine(&catalog, "s").unwrap();
    match with_timeout(engine.exec()).await {
        Err(FieldflowError::TaskFailed { source, .. }) => {
            assert!(matches!(source, TaskError::MissingInput(ref f) if f == "x"));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    // Absent inputs are simply missing from the map.
    assert_eq!(recorder.inputs_of("Double"), Some(FieldMap::new()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outputs_broadcast_to_every_attached_bus() {
    init_tracing();
    let recorder = Recorder::new();
    let catalog = CatalogBuilder::new()
        .with_input("seed")
        .with_task(
            TaskDef::new("Double")
                .depends_on(["seed"])
                .produces(FieldRole::Result, ["doubled"]),
            doubling(&recorder, "Double", "seed", "doubled"),
        )
        .with_scene("s", &["doubled"])
        .build();

    let engine = build_scene_engine(&catalog, "s").unwrap();

    // The input lives only on the extra bus; the scan still finds it.
    let session_bus = Arc::new(DataBus::new());
    session_bus.set("seed", json!(21));
    assert!(engine.attach_bus(7, Arc::clone(&session_bus)).is_none());
    assert_eq!(engine.buses().sessions(), vec![0, 7]);

    with_timeout(engine.exec()).await.unwrap();

    assert_eq!(session_bus.get("doubled"), Some(json!(42)));
    let default_bus = engine.buses().bus(fieldflow::DEFAULT_SESSION).unwrap();
    assert_eq!(default_bus.get("doubled"), Some(json!(42)));
    assert_eq!(default_bus.get("seed"), None);

    let detached = engine.detach_bus(7).unwrap();
    assert!(Arc::ptr_eq(&detached, &session_bus));
    assert_eq!(engine.buses().sessions(), vec![0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_can_run_again_after_completion() {
    init_tracing();
    let recorder = Recorder::new();
    let catalog = CatalogBuilder::new()
        .with_task(
            TaskDef::new("Once").produces(FieldRole::Result, ["v"]),
            recorder.emit("Once", fields([("v", json!(1))])),
        )
        .with_scene("s", &["v"])
        .build();

    let engine = build_scene_engine(&catalog, "s").unwrap();
    with_timeout(engine.exec()).await.unwrap();
    with_timeout(engine.exec()).await.unwrap();

    assert_eq!(recorder.started(), vec!["Once", "Once"]);
    assert_eq!(engine.phase(), EnginePhase::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_run_resets_phase_and_discards_late_outputs() {
    init_tracing();
    let recorder = Recorder::new();
    let catalog = CatalogBuilder::new()
        .with_task(
            task("Slow", &[], &["a"]),
            recorder.slow_emit("Slow", Duration::from_millis(200), fields([("a", json!(1))])),
        )
        .with_task(
            task("Next", &["a"], &["b"]),
            recorder.emit("Next", fields([("b", json!(2))])),
        )
        .with_scene("s", &["b"])
        .build();

    let engine = build_scene_engine(&catalog, "s").unwrap();
    let abandoned = tokio::time::timeout(Duration::from_millis(50), engine.exec()).await;
    assert!(abandoned.is_err());
    assert_eq!(engine.phase(), EnginePhase::Failed);

    // Give the detached unit time to finish its runnable.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        recorder.events(),
        vec![Event::Started("Slow".into()), Event::Finished("Slow".into())]
    );
    assert_eq!(engine.buses().get("a"), None);
    assert!(!recorder.ran("Next"));

    // The engine is usable again.
    let report = with_timeout(engine.exec()).await.unwrap();
    assert_eq!(report.completed, vec!["Next", "Slow"]);
    assert_eq!(engine.phase(), EnginePhase::Completed);
    assert_eq!(engine.data_bus_values(), fields([("b", json!(2))]));
}
