// src/catalog/mod.rs

//! Field/task catalog.
//!
//! - [`task`] defines `TaskDef` (what a task reads and writes) and
//!   `RegisteredTask` (definition + runnable).
//! - [`registry`] holds the `Catalog` itself: task registration with
//!   single-writer conflict checks, input declarations and scene
//!   configuration.

pub mod registry;
pub mod task;

pub use registry::{Catalog, CatalogView};
pub use task::{OutputField, RegisteredTask, TaskDef};
