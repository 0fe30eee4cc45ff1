// src/exec/emit.rs

use crate::errors::TaskError;
use crate::exec::Runnable;
use crate::types::FieldMap;

/// Runnable that ignores its inputs and returns a fixed set of values.
///
/// Backs `emit = { ... }` tasks in catalog files; also handy for seeding
/// constants in tests.
#[derive(Debug, Clone, Default)]
pub struct EmitRunnable {
    values: FieldMap,
}

impl EmitRunnable {
    pub fn new(values: FieldMap) -> Self {
        Self { values }
    }
}

impl Runnable for EmitRunnable {
    fn run(&self, _context: &FieldMap, _inputs: &FieldMap) -> Result<FieldMap, TaskError> {
        Ok(self.values.clone())
    }
}
