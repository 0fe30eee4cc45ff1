// src/engine/scene.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::bus::{BusSet, DataBus};
use crate::dag::{Node, Topology};
use crate::engine::EnginePhase;
use crate::errors::Result;
use crate::types::{FieldMap, FieldName, FieldValue, SessionId, TaskName};

/// Node set shared between the engine and in-flight runs.
pub(crate) type NodeSet = Arc<BTreeMap<TaskName, Node>>;

/// Bookkeeping guarded by the engine lock.
///
/// The lock is held only while this struct is read or replaced, never while
/// a task runs.
#[derive(Debug)]
struct EngineState {
    nodes: NodeSet,
    /// `Some` once the current node set has been prepared.
    topology: Option<Arc<Topology>>,
    phase: EnginePhase,
}

impl EngineState {
    /// Prepare the current node set if that has not happened yet.
    fn ensure_prepared(&mut self, scene: &str) -> Result<Arc<Topology>> {
        if let Some(topology) = &self.topology {
            return Ok(Arc::clone(topology));
        }

        self.phase = EnginePhase::Preparing;
        match Topology::prepare(&self.nodes) {
            Ok(topology) => {
                let topology = Arc::new(topology);
                self.topology = Some(Arc::clone(&topology));
                self.phase = EnginePhase::Ready;
                Ok(topology)
            }
            Err(e) => {
                self.phase = EnginePhase::Unbuilt;
                error!(scene = %scene, error = %e, "scene preparation failed");
                Err(e)
            }
        }
    }
}

/// Executes one scene's task graph.
///
/// Owned by whoever built it. `exec` takes `&self`; node updates between
/// runs are fine, and a run already in progress keeps the node set and
/// topology it started with.
pub struct SceneEngine {
    scene: String,
    output_fields: Vec<FieldName>,
    context: Arc<FieldMap>,
    pub(crate) buses: Arc<BusSet>,
    state: Mutex<EngineState>,
}

impl fmt::Debug for SceneEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneEngine")
            .field("scene", &self.scene)
            .field("output_fields", &self.output_fields)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl SceneEngine {
    /// New engine that will report `output_fields` after a run.
    ///
    /// Starts with no nodes, an empty context and one default data bus.
    pub fn new<I, S>(output_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        Self {
            scene: String::new(),
            output_fields: output_fields.into_iter().map(Into::into).collect(),
            context: Arc::new(FieldMap::new()),
            buses: Arc::new(BusSet::new()),
            state: Mutex::new(EngineState {
                nodes: Arc::new(BTreeMap::new()),
                topology: None,
                phase: EnginePhase::Unbuilt,
            }),
        }
    }

    /// Label used in logs.
    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = scene.into();
        self
    }

    /// Context handed to every runnable (empty by default).
    pub fn with_context(mut self, context: FieldMap) -> Self {
        self.context = Arc::new(context);
        self
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn output_fields(&self) -> &[FieldName] {
        &self.output_fields
    }

    pub(crate) fn context(&self) -> Arc<FieldMap> {
        Arc::clone(&self.context)
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> EnginePhase {
        self.lock().phase
    }

    pub fn is_prepared(&self) -> bool {
        self.lock().topology.is_some()
    }

    /// Replace the node set and drop any prepared topology.
    pub fn update_tasks(&self, nodes: BTreeMap<TaskName, Node>) {
        let mut state = self.lock();
        debug!(
            scene = %self.scene,
            tasks = nodes.len(),
            "installing node set; topology invalidated"
        );
        state.nodes = Arc::new(nodes);
        state.topology = None;
        state.phase = EnginePhase::Unbuilt;
    }

    /// Validate the current node set. Idempotent; `exec` calls it lazily.
    pub fn prepare(&self) -> Result<()> {
        self.lock().ensure_prepared(&self.scene).map(|_| ())
    }

    /// Prepare if needed, mark the engine running, and hand back the node
    /// set and topology this run will use.
    pub(crate) fn begin_run(&self) -> Result<(NodeSet, Arc<Topology>)> {
        let mut state = self.lock();
        let topology = state.ensure_prepared(&self.scene)?;
        state.phase = EnginePhase::Running;
        Ok((Arc::clone(&state.nodes), topology))
    }

    pub(crate) fn finish_run(&self, phase: EnginePhase) {
        let mut state = self.lock();
        // A node update during the run already reset the phase; keep that.
        if state.phase == EnginePhase::Running {
            state.phase = phase;
        }
    }

    /// Names of the tasks currently installed, sorted.
    pub fn derived_tasks(&self) -> Vec<TaskName> {
        self.lock().nodes.keys().cloned().collect()
    }

    /// Output fields of this scene, each mapped to the first value found
    /// across the attached buses. Fields nobody wrote are omitted.
    pub fn data_bus_values(&self) -> BTreeMap<FieldName, FieldValue> {
        self.output_fields
            .iter()
            .filter_map(|field| self.buses.get(field).map(|v| (field.clone(), v)))
            .collect()
    }

    /// Write a caller-supplied value (e.g. a request input) to every bus.
    pub fn seed(&self, field: &str, value: FieldValue) {
        debug!(scene = %self.scene, field = %field, "seeding field");
        self.buses.broadcast(field, value);
    }

    pub fn buses(&self) -> &BusSet {
        &self.buses
    }

    /// Attach an additional bus under `session`; later writes reach it too.
    pub fn attach_bus(&self, session: SessionId, bus: Arc<DataBus>) -> Option<Arc<DataBus>> {
        self.buses.attach(session, bus)
    }

    pub fn detach_bus(&self, session: SessionId) -> Option<Arc<DataBus>> {
        self.buses.detach(session)
    }
}
