// src/exec/runnable.rs

//! The capability every task implements.

use std::sync::Arc;

use crate::errors::TaskError;
use crate::types::FieldMap;

/// A unit of task logic.
///
/// Implementations must be safe to call concurrently with other runnables:
/// the data bus is the only state tasks are meant to share, and the engine
/// owns all bus access. A runnable just maps `(context, inputs)` to outputs.
///
/// Runnables are invoked on a blocking thread, so synchronous work
/// (including spawning and waiting on processes) is fine.
pub trait Runnable: Send + Sync {
    fn run(&self, context: &FieldMap, inputs: &FieldMap) -> Result<FieldMap, TaskError>;
}

/// Runnable handle as stored in the catalog.
pub type SharedRunnable = Arc<dyn Runnable>;

impl<F> Runnable for F
where
    F: Fn(&FieldMap, &FieldMap) -> Result<FieldMap, TaskError> + Send + Sync,
{
    fn run(&self, context: &FieldMap, inputs: &FieldMap) -> Result<FieldMap, TaskError> {
        self(context, inputs)
    }
}

/// Wrap a closure as a [`SharedRunnable`].
///
/// Going through this function pins the closure's signature to the
/// higher-ranked `Fn(&FieldMap, &FieldMap)` form, so callers can write
/// `from_fn(|_ctx, inputs| ...)` without annotating argument types.
pub fn from_fn<F>(f: F) -> SharedRunnable
where
    F: Fn(&FieldMap, &FieldMap) -> Result<FieldMap, TaskError> + Send + Sync + 'static,
{
    Arc::new(f)
}
