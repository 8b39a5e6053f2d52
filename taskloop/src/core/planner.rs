//! Planner seam and the deterministic fallback policy.
//!
//! A [`Planner`] proposes the next task and tool plan for an iteration. The
//! proposal is untrusted either way: whatever the implementation, it passes
//! through the validator before anything executes.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde_json::Value;

use crate::core::types::{Fact, FactSet, Plan, TaskSpec, ToolStep};

/// One iteration's input to a planner.
///
/// `context_snapshot` is a bounded view of the run context; planners must not
/// assume full visibility.
#[derive(Debug)]
pub struct ProposeRequest<'a> {
    /// Tasks whose preconditions are met this iteration, fully populated.
    pub runnable: &'a [TaskSpec],
    pub facts: &'a FactSet,
    pub available_inputs: &'a BTreeSet<Fact>,
    pub context_snapshot: BTreeMap<String, Value>,
}

/// Why a planner failed to produce a proposal. All variants are fatal; this
/// core never retries a planner.
#[derive(Debug, thiserror::Error)]
pub enum ProposeError {
    /// The planner's response could not be parsed into a well-formed plan.
    #[error("malformed planner response: {0}")]
    Parse(String),
    /// The planner did not answer within its deadline.
    #[error("planner timed out after {0:?}")]
    Timeout(Duration),
    /// The planner backend failed outright (spawn failure, non-zero exit).
    #[error("planner backend failed: {0}")]
    Backend(String),
}

/// Source of task/tool proposals.
///
/// `Ok(None)` means the planner found no eligible candidate and the run
/// should stop normally. External planners are expected to always propose or
/// fail; only deterministic policies exhaust.
pub trait Planner {
    fn propose(&self, request: &ProposeRequest<'_>) -> Result<Option<Plan>, ProposeError>;
}

/// Pick the next task without consulting an external planner.
///
/// Candidates must hold all required inputs and still have an unmet
/// postcondition (tasks declaring none always qualify). The winner is the
/// lowest `(priority, name)`; the name tie-break keeps selection
/// deterministic across runs.
pub fn choose_next<'a>(
    runnable: &'a [TaskSpec],
    facts: &FactSet,
    available_inputs: &BTreeSet<Fact>,
) -> Option<&'a TaskSpec> {
    runnable
        .iter()
        .filter(|task| task.required_inputs.is_subset(available_inputs))
        .filter(|task| !task.postconditions_satisfied(facts))
        .min_by_key(|task| (task.priority, task.name.clone()))
}

/// Deterministic planner: priority selection plus the task's declared tools.
///
/// Ineligible candidates are skipped rather than rejected, matching the
/// non-oracle selection policy.
pub struct PriorityPlanner;

impl Planner for PriorityPlanner {
    fn propose(&self, request: &ProposeRequest<'_>) -> Result<Option<Plan>, ProposeError> {
        let chosen = choose_next(request.runnable, request.facts, request.available_inputs);
        Ok(chosen.map(declared_plan))
    }
}

/// Build a plan invoking every tool the task declares, with empty arguments.
fn declared_plan(task: &TaskSpec) -> Plan {
    Plan {
        task_name: task.name.clone(),
        tool_plan: task
            .allowed_tools
            .iter()
            .map(|tool| ToolStep {
                tool_name: tool.clone(),
                tool_args: serde_json::Map::new(),
            })
            .collect(),
        rationale: "priority policy selection".to_string(),
    }
}
