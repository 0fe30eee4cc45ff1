use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Name of a field flowing between tasks.
pub type FieldName = String;

/// Opaque value stored on the data bus.
pub type FieldValue = serde_json::Value;

/// Field name → value, used for runnable inputs, outputs and context.
pub type FieldMap = BTreeMap<FieldName, FieldValue>;

/// Identifier under which a data bus is attached to an engine.
pub type SessionId = u64;

/// Role of an output field.
///
/// Only used for conflict checking at registration time:
/// - `External` fields may be declared by several tasks without conflict.
/// - every other role admits exactly one writer.
///
/// The role never affects scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Request,
    #[default]
    Intermediate,
    Result,
    External,
}

impl FieldRole {
    pub fn is_external(self) -> bool {
        matches!(self, FieldRole::External)
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldRole::Request => "request",
            FieldRole::Intermediate => "intermediate",
            FieldRole::Result => "result",
            FieldRole::External => "external",
        };
        f.write_str(s)
    }
}

impl FromStr for FieldRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "request" => Ok(FieldRole::Request),
            "intermediate" => Ok(FieldRole::Intermediate),
            "result" => Ok(FieldRole::Result),
            "external" => Ok(FieldRole::External),
            other => Err(format!(
                "invalid field role: {other} (expected \"request\", \"intermediate\", \"result\" or \"external\")"
            )),
        }
    }
}
