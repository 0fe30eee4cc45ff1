// src/engine/run.rs

//! Concurrent execution of a prepared scene.
//!
//! Every ready task becomes its own blocking unit in a `JoinSet`. The
//! `exec` future is the only coordinator: it takes completions off the set,
//! decrements the in-degree of the finished task's dependents and dispatches
//! whichever reach zero. The in-degree table is a local copy, so nothing
//! but the coordinator ever touches it.
//!
//! Failure policy: the first failing unit cancels the run. Nothing new is
//! dispatched, units that were spawned but have not started yet skip their
//! work, and units already running finish normally (their outputs stay on
//! the bus). `exec` then reports which task failed and what completed.
//! A unit the runtime loses (a join error) stops the run the same way.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::bus::BusSet;
use crate::catalog::RegisteredTask;
use crate::dag::{Node, Topology};
use crate::engine::{EnginePhase, ExecReport, SceneEngine};
use crate::errors::{FieldflowError, Result, TaskError};
use crate::types::{FieldMap, TaskName};

/// What a unit reports back to the coordinator.
#[derive(Debug)]
enum UnitOutcome {
    Succeeded,
    Failed(TaskError),
    /// Cancelled before the runnable was invoked, or abandoned while it ran.
    Skipped,
}

#[derive(Debug)]
struct UnitReport {
    task: TaskName,
    outcome: UnitOutcome,
}

/// Resets the engine phase if `exec` is dropped before it finishes.
struct RunGuard<'a> {
    engine: &'a SceneEngine,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    fn new(engine: &'a SceneEngine) -> Self {
        Self {
            engine,
            finished: false,
        }
    }

    fn finish(mut self, phase: EnginePhase) {
        self.finished = true;
        self.engine.finish_run(phase);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(scene = %self.engine.scene(), "scene run dropped before completion");
            self.engine.finish_run(EnginePhase::Failed);
        }
    }
}

/// Single coordinator for one run.
///
/// Owns the unit set and the local in-degree table; nothing else touches
/// either. `cancel` stops new work after a failure, `abandon` (its parent)
/// additionally discards the outputs of units that finish after the caller
/// dropped the run.
struct Coordinator<'a> {
    nodes: &'a BTreeMap<TaskName, Node>,
    topology: &'a Topology,
    buses: &'a Arc<BusSet>,
    context: Arc<FieldMap>,
    cancel: CancellationToken,
    abandon: CancellationToken,
    units: JoinSet<UnitReport>,
    in_degree: HashMap<TaskName, usize>,
    completed: Vec<TaskName>,
    skipped: Vec<TaskName>,
    failure: Option<(TaskName, TaskError)>,
    join_error: Option<JoinError>,
}

impl<'a> Coordinator<'a> {
    fn new(
        nodes: &'a BTreeMap<TaskName, Node>,
        topology: &'a Topology,
        buses: &'a Arc<BusSet>,
        context: Arc<FieldMap>,
        abandon: &CancellationToken,
    ) -> Self {
        Self {
            nodes,
            topology,
            buses,
            context,
            cancel: abandon.child_token(),
            abandon: abandon.clone(),
            units: JoinSet::new(),
            in_degree: topology.in_degree.clone(),
            completed: Vec::with_capacity(nodes.len()),
            skipped: Vec::new(),
            failure: None,
            join_error: None,
        }
    }

    fn dispatch(&mut self, name: &str) {
        let Some(node) = self.nodes.get(name) else {
            return;
        };
        spawn_unit(
            &mut self.units,
            &node.task,
            self.buses,
            &self.context,
            &self.cancel,
            &self.abandon,
        );
    }

    /// Take completions until the unit set is empty.
    ///
    /// After a failure or a lost unit nothing new is dispatched, but every
    /// unit already in the set is still joined.
    async fn drive(&mut self) {
        while let Some(joined) = self.units.join_next().await {
            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    // Panics are caught inside the unit, so this means the
                    // runtime is tearing the unit down.
                    self.cancel.cancel();
                    error!(error = %e, "task unit could not be joined; draining run");
                    if self.join_error.is_none() {
                        self.join_error = Some(e);
                    }
                    continue;
                }
            };

            match report.outcome {
                UnitOutcome::Succeeded => {
                    if !self.cancel.is_cancelled() {
                        self.unlock_dependents(&report.task);
                    }
                    self.completed.push(report.task);
                }
                UnitOutcome::Failed(err) => {
                    self.cancel.cancel();
                    if self.failure.is_none() {
                        error!(task = %report.task, error = %err, "task failed; cancelling run");
                        self.failure = Some((report.task, err));
                    } else {
                        warn!(
                            task = %report.task,
                            error = %err,
                            "another task failed while the run was draining"
                        );
                    }
                }
                UnitOutcome::Skipped => self.skipped.push(report.task),
            }
        }
    }

    fn unlock_dependents(&mut self, finished: &str) {
        let topology = self.topology;
        for dependent in topology.dependents_of(finished) {
            let Some(count) = self.in_degree.get_mut(dependent) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                trace!(task = %dependent, unlocked_by = %finished, "dependencies complete");
                self.dispatch(dependent);
            }
        }
    }
}

impl SceneEngine {
    /// Run the scene's task graph to completion.
    ///
    /// Prepares first if the node set changed since the last preparation.
    /// Resolves once every dispatched unit has finished, including units
    /// unlocked along the way.
    ///
    /// Dropping the returned future abandons the run: units that have not
    /// started are skipped, units still running have their outputs
    /// discarded, and the engine phase becomes `Failed`.
    #[instrument(name = "scene_exec", skip(self), fields(scene = %self.scene()))]
    pub async fn exec(&self) -> Result<ExecReport> {
        let started = Instant::now();
        let (nodes, topology) = self.begin_run()?;
        let guard = RunGuard::new(self);

        info!(
            tasks = nodes.len(),
            ready = ?topology.ready,
            "scene run started"
        );

        let abandon = CancellationToken::new();
        let _abandon_on_drop = abandon.clone().drop_guard();

        let mut run = Coordinator::new(&nodes, &topology, &self.buses, self.context(), &abandon);
        for name in &topology.ready {
            run.dispatch(name);
        }
        run.drive().await;

        let Coordinator {
            mut completed,
            skipped,
            failure,
            join_error,
            ..
        } = run;
        completed.sort();
        let elapsed = started.elapsed();

        if let Some(e) = join_error {
            guard.finish(EnginePhase::Failed);
            return Err(FieldflowError::Join(e));
        }

        if let Some((task, source)) = failure {
            warn!(
                failed = %task,
                completed = completed.len(),
                skipped = ?skipped,
                total = nodes.len(),
                "scene run failed"
            );
            guard.finish(EnginePhase::Failed);
            return Err(FieldflowError::TaskFailed {
                task,
                source,
                completed,
            });
        }

        info!(
            completed = completed.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scene run completed"
        );
        guard.finish(EnginePhase::Completed);

        Ok(ExecReport { completed, elapsed })
    }
}

fn spawn_unit(
    units: &mut JoinSet<UnitReport>,
    task: &Arc<RegisteredTask>,
    buses: &Arc<BusSet>,
    context: &Arc<FieldMap>,
    cancel: &CancellationToken,
    abandon: &CancellationToken,
) {
    let task = Arc::clone(task);
    let buses = Arc::clone(buses);
    let context = Arc::clone(context);
    let cancel = cancel.clone();
    let abandon = abandon.clone();

    debug!(task = %task.name(), "dispatching task");
    units.spawn_blocking(move || run_unit(&task, &buses, &context, &cancel, &abandon));
}

/// Body of one unit: gather inputs, run, publish outputs.
///
/// Outputs are broadcast before the report is returned, so a dependent
/// dispatched off this report always sees them.
fn run_unit(
    task: &RegisteredTask,
    buses: &BusSet,
    context: &FieldMap,
    cancel: &CancellationToken,
    abandon: &CancellationToken,
) -> UnitReport {
    let name = task.name().to_string();

    if cancel.is_cancelled() {
        debug!(task = %name, "run cancelled before task started; skipping");
        return UnitReport {
            task: name,
            outcome: UnitOutcome::Skipped,
        };
    }

    let mut inputs = FieldMap::new();
    for field in &task.def.dep_fields {
        match buses.get(field) {
            Some(value) => {
                inputs.insert(field.clone(), value);
            }
            None => trace!(task = %name, field = %field, "input absent from data bus"),
        }
    }

    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| task.runnable.run(context, &inputs)))
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    let outcome = match result {
        Ok(_) if abandon.is_cancelled() => {
            debug!(task = %name, "run abandoned while task was running; discarding outputs");
            UnitOutcome::Skipped
        }
        Ok(outputs) => {
            for (field, value) in outputs {
                if !task.def.writes(&field) {
                    warn!(task = %name, field = %field, "task wrote an undeclared field");
                }
                buses.broadcast(&field, value);
            }
            debug!(
                task = %name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "task completed"
            );
            UnitOutcome::Succeeded
        }
        Err(err) => UnitOutcome::Failed(err),
    };

    UnitReport {
        task: name,
        outcome,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
