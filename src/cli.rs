// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;
use crate::errors::{FieldflowError, Result};
use crate::types::{FieldName, FieldValue};

/// Command-line arguments for `fieldflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fieldflow",
    version,
    about = "Derive and run the tasks that produce a scene's fields.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the catalog file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Scene to build and run.
    #[arg(long, value_name = "ID", required_unless_present = "list_scenes")]
    pub scene: Option<String>,

    /// Seed a field before the run, as `field=<json>`. Values that are not
    /// valid JSON are taken as plain strings. Repeatable.
    #[arg(long = "input", value_name = "FIELD=JSON")]
    pub inputs: Vec<String>,

    /// Validate and print the derived tasks and edges; run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Print configured scenes and exit.
    #[arg(long)]
    pub list_scenes: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FIELDFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Split a `field=<json>` argument.
pub fn parse_input(arg: &str) -> Result<(FieldName, FieldValue)> {
    let (field, raw) = arg.split_once('=').ok_or_else(|| {
        FieldflowError::ConfigError(format!("input '{arg}' must look like field=<json>"))
    })?;

    let field = field.trim();
    if field.is_empty() {
        return Err(FieldflowError::ConfigError(format!(
            "input '{arg}' has an empty field name"
        )));
    }

    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| FieldValue::String(raw.to_string()));

    Ok((field.to_string(), value))
}
