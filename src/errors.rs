// src/errors.rs

//! Crate-wide error types.
//!
//! [`FieldflowError`] covers catalog registration, derivation, preparation,
//! execution and config loading. [`TaskError`] is what a
//! [`Runnable`](crate::exec::Runnable) returns when its own logic fails.

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum FieldflowError {
    #[error("Task already registered: {0}")]
    DuplicateTask(TaskName),

    #[error("Field conflict: field '{field}' is already written by task '{writer}' (while registering '{task}')")]
    FieldConflict {
        field: String,
        writer: TaskName,
        task: TaskName,
    },

    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    #[error("Field '{0}' is not written by any task")]
    UnwrittenField(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: TaskName,
        #[source]
        source: TaskError,
        /// Tasks that finished successfully before the run stopped.
        completed: Vec<TaskName>,
    },

    #[error("Task unit could not be joined: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by a single task's runnable.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The runnable rejected its inputs or its own computation failed.
    #[error("{0}")]
    Failed(String),

    /// A required input field was absent from the data bus.
    #[error("missing input field '{0}'")]
    MissingInput(String),

    /// The runnable panicked; the payload is captured when it is a string.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// External command exited unsuccessfully.
    #[error("command exited with code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FieldflowError>;
