//! Shared deterministic types for the orchestration core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An achieved world condition, compared by name only.
pub type Fact = String;

/// The set of achieved facts for a run. Grows monotonically; facts are never
/// removed.
pub type FactSet = BTreeSet<Fact>;

fn default_priority() -> i64 {
    1000
}

/// Full declaration of a task as materialized from the catalog.
///
/// Field names follow the external catalog record format, so a snapshot can be
/// deserialized directly from a catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique name within a catalog snapshot.
    pub name: String,
    /// Lower value means higher precedence.
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub preconditions: BTreeSet<Fact>,
    #[serde(default)]
    pub postconditions: BTreeSet<Fact>,
    /// Inputs the caller must hold before the task may run.
    #[serde(default, rename = "inputs")]
    pub required_inputs: BTreeSet<Fact>,
    /// Tools a plan for this task is permitted to invoke.
    #[serde(default, rename = "tools")]
    pub allowed_tools: BTreeSet<String>,
}

impl TaskSpec {
    /// A task is runnable iff every precondition is already achieved
    /// (vacuously true for an empty precondition set).
    pub fn is_runnable(&self, facts: &FactSet) -> bool {
        self.preconditions.is_subset(facts)
    }

    /// True when the task declares postconditions and all of them are already
    /// achieved. Tasks with no postconditions never count as satisfied.
    pub fn postconditions_satisfied(&self, facts: &FactSet) -> bool {
        !self.postconditions.is_empty() && self.postconditions.is_subset(facts)
    }
}

/// A single proposed tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStep {
    pub tool_name: String,
    #[serde(default)]
    pub tool_args: serde_json::Map<String, Value>,
}

/// A raw proposal from a planner. Untrusted until validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub task_name: String,
    #[serde(default)]
    pub tool_plan: Vec<ToolStep>,
    /// Informational only; never validated.
    #[serde(default)]
    pub rationale: String,
}

/// Mutable result store shared across a whole run.
///
/// Owned exclusively by the orchestration loop; tools read and write entries,
/// and planners see a bounded read-only snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bounded view for planner payloads: the first `limit` entries in key
    /// order. Key order keeps snapshots stable across runs.
    pub fn snapshot(&self, limit: usize) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
