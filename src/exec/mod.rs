// src/exec/mod.rs

//! Task logic layer.
//!
//! The engine never knows what a task does; it only calls the task's
//! [`Runnable`] with the current context and the inputs gathered from the
//! data bus.
//!
//! - [`runnable`] defines the `Runnable` capability trait and the closure
//!   adapter used for programmatic registration.
//! - [`emit`] provides `EmitRunnable`, which returns a fixed set of values.
//! - [`command`] provides `CommandRunnable`, which runs a shell command and
//!   exchanges inputs/outputs as JSON over stdin/stdout.

pub mod command;
pub mod emit;
pub mod runnable;

pub use command::CommandRunnable;
pub use emit::EmitRunnable;
pub use runnable::{Runnable, SharedRunnable, from_fn};
