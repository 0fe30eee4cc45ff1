// src/engine/mod.rs

//! Scene execution engine.
//!
//! A [`SceneEngine`] owns the node set for one scene, prepares its topology
//! and executes it:
//! - [`scene`] holds the engine state, node updates, preparation and the
//!   read-back accessors.
//! - [`run`] implements `exec`: one blocking unit per ready task, with a
//!   single coordinator that applies completions and dispatches the tasks
//!   they unlock.
//! - [`build`] wires catalog → resolver → engine for a configured scene.

use std::fmt;
use std::time::Duration;

use crate::types::TaskName;

pub mod build;
pub mod run;
pub mod scene;

pub use build::build_scene_engine;
pub use scene::SceneEngine;

/// Lifecycle of a scene engine.
///
/// Installing a new node set always returns the engine to `Unbuilt`, so the
/// next run re-prepares from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No validated topology for the current node set.
    Unbuilt,
    Preparing,
    /// Topology validated; ready to run.
    Ready,
    Running,
    /// The last run finished with every task succeeding.
    Completed,
    /// The last run stopped on a task failure.
    Failed,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnginePhase::Unbuilt => "unbuilt",
            EnginePhase::Preparing => "preparing",
            EnginePhase::Ready => "ready",
            EnginePhase::Running => "running",
            EnginePhase::Completed => "completed",
            EnginePhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct ExecReport {
    /// Every task that ran, sorted by name.
    pub completed: Vec<TaskName>,
    pub elapsed: Duration,
}
