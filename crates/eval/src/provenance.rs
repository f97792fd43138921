//! Evaluation traces: which context values a rule read, and what happened.
//!
//! A trace is attached to one evaluation of one rule. It records every
//! variable path resolved against the context (first access wins, later
//! reads of the same path are not repeated) and a list of coded log entries
//! following each variable read and any failure of the rule.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::value::Value;

/// Codes used in [`LogEntry::code`].
pub mod codes {
    pub const VARIABLE_EVALUATION_STARTED: &str = "variable_evaluation_started";
    pub const VARIABLE_EVALUATION_RESULT: &str = "variable_evaluation_result";
    pub const VARIABLE_EVALUATION_FAILED: &str = "variable_evaluation_failed";
    /// Evaluation failed outside a variable read, or the rule did not
    /// produce a Bool.
    pub const UNKNOWN_EXCEPTION: &str = "unknown_exception";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub code: String,
    pub message: String,
}

/// Collector for accessed values and log entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationTrace {
    /// Path to first-read value, in read order. Serialized as a list of
    /// `{path, value}` objects.
    #[serde(serialize_with = "accessed_entries")]
    pub accessed: IndexMap<String, Value>,
    pub log: Vec<LogEntry>,
}

#[derive(Serialize)]
struct AccessedEntry<'a> {
    path: &'a str,
    value: &'a Value,
}

fn accessed_entries<S: Serializer>(
    accessed: &IndexMap<String, Value>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        accessed
            .iter()
            .map(|(path, value)| AccessedEntry { path, value }),
    )
}

impl EvaluationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a context read. Repeated reads of a path are kept once.
    pub fn record_access(&mut self, path: &str, value: &Value) {
        if !self.accessed.contains_key(path) {
            self.accessed.insert(path.to_string(), value.clone());
        }
    }

    pub fn log(&mut self, code: &str, message: impl Into<String>) {
        self.log.push(LogEntry {
            code: code.to_string(),
            message: message.into(),
        });
    }

    pub fn accessed_paths(&self) -> impl Iterator<Item = &str> {
        self.accessed.keys().map(String::as_str)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.log.iter().any(|e| e.code == code)
    }
}
