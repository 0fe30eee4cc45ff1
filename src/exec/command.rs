// src/exec/command.rs

//! Shell command runnable.
//!
//! Wire contract with the child process:
//! - stdin receives the task inputs as a single JSON object;
//! - `FIELDFLOW_CONTEXT` holds the run context as a JSON object;
//! - stdout must be a JSON object of output fields (empty stdout means
//!   "no outputs");
//! - a non-zero exit status fails the task, carrying stderr.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::{debug, warn};

use crate::errors::TaskError;
use crate::exec::Runnable;
use crate::types::FieldMap;

pub const CONTEXT_ENV: &str = "FIELDFLOW_CONTEXT";

#[derive(Debug, Clone)]
pub struct CommandRunnable {
    cmd: String,
}

impl CommandRunnable {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }
}

impl Runnable for CommandRunnable {
    fn run(&self, context: &FieldMap, inputs: &FieldMap) -> Result<FieldMap, TaskError> {
        let stdin_payload = serde_json::to_vec(inputs).context("encoding task inputs")?;
        let context_payload = serde_json::to_string(context).context("encoding task context")?;

        debug!(cmd = %self.cmd, "spawning command runnable");

        let mut child = self
            .shell()
            .env(CONTEXT_ENV, context_payload)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning command '{}'", self.cmd))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A child that never reads stdin may exit before we finish writing.
            if let Err(e) = stdin.write_all(&stdin_payload) {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(anyhow::Error::from(e)
                        .context(format!("writing inputs to command '{}'", self.cmd))
                        .into());
                }
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for command '{}'", self.cmd))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(cmd = %self.cmd, exit_code = code, "command runnable failed");
            return Err(TaskError::CommandFailed { code, stderr });
        }
        if !stderr.is_empty() {
            debug!(cmd = %self.cmd, "stderr: {}", stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(FieldMap::new());
        }

        serde_json::from_str::<FieldMap>(stdout).map_err(|e| {
            TaskError::Failed(format!(
                "command '{}' must print a JSON object of outputs: {e}",
                self.cmd
            ))
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_object_from_stdout() {
        let r = CommandRunnable::new(r#"echo '{"a": 1, "b": "two"}'"#);
        let out = r.run(&FieldMap::new(), &FieldMap::new()).unwrap();
        assert_eq!(out.get("a"), Some(&json!(1)));
        assert_eq!(out.get("b"), Some(&json!("two")));
    }

    #[test]
    fn receives_inputs_on_stdin() {
        let r = CommandRunnable::new("cat");
        let inputs = FieldMap::from([("x".to_string(), json!(5))]);
        let out = r.run(&FieldMap::new(), &inputs).unwrap();
        assert_eq!(out, inputs);
    }

    #[test]
    fn receives_context_in_env() {
        let r = CommandRunnable::new(r#"printf '{"ctx": %s}' "$FIELDFLOW_CONTEXT""#);
        let ctx = FieldMap::from([("trace".to_string(), json!("abc"))]);
        let out = r.run(&ctx, &FieldMap::new()).unwrap();
        assert_eq!(out.get("ctx"), Some(&json!({"trace": "abc"})));
    }

    #[test]
    fn non_zero_exit_is_command_failed() {
        let r = CommandRunnable::new("echo boom >&2; exit 3");
        let err = r.run(&FieldMap::new(), &FieldMap::new()).unwrap_err();
        match err {
            TaskError::CommandFailed { code, stderr } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn empty_stdout_means_no_outputs() {
        let r = CommandRunnable::new("true");
        let out = r.run(&FieldMap::new(), &FieldMap::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn non_object_stdout_is_rejected() {
        let r = CommandRunnable::new("echo 42");
        let err = r.run(&FieldMap::new(), &FieldMap::new()).unwrap_err();
        assert!(matches!(err, TaskError::Failed(_)));
    }
}
