// src/dag/mod.rs

//! Task graph derivation and topology.
//!
//! - [`resolver`] walks a scene's desired fields back through their writers
//!   and produces the minimal node set.
//! - [`node`] holds the per-derivation `Node` type.
//! - [`topology`] computes in-degrees and the ready-queue and rejects node
//!   sets that can never finish.
//! - [`graph`] builds a `petgraph` view for catalog-wide cycle checks and
//!   diagnostics.

pub mod graph;
pub mod node;
pub mod resolver;
pub mod topology;

pub use graph::TaskGraph;
pub use node::Node;
pub use resolver::{derive_fields, derive_scene, derive_tasks};
pub use topology::Topology;
