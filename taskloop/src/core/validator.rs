//! Independent validation of planner proposals.
//!
//! The planner is untrusted input: this module is the sole authority on
//! whether a proposal may execute. Every constraint is re-derived from the
//! catalog's own `TaskSpec` declarations; nothing echoed back by the planner
//! is trusted.

use std::collections::BTreeSet;

use crate::core::types::{Fact, FactSet, Plan, TaskSpec, ToolStep};

/// Reason a proposal was rejected. All variants are fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The proposed task name is not in this iteration's runnable set.
    #[error("unknown task '{0}': not in the runnable set")]
    UnknownTask(String),
    /// The task requires inputs the caller does not hold.
    #[error("task '{task}' is missing required inputs: {}", format_facts(.missing))]
    MissingInputs { task: String, missing: BTreeSet<Fact> },
    /// Every declared postcondition is already achieved.
    #[error("task '{0}' has all postconditions already satisfied")]
    AlreadySatisfied(String),
    /// A proposed step names a tool outside the task's allowed set.
    #[error("tool '{tool}' is not allowed for task '{task}'")]
    DisallowedTool { task: String, tool: String },
}

fn format_facts(facts: &BTreeSet<Fact>) -> String {
    facts.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// A proposal that passed validation. Only this type reaches the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    /// The catalog's own declaration of the selected task.
    pub task: TaskSpec,
    /// Steps in planner-chosen order. Never reordered.
    pub tool_steps: Vec<ToolStep>,
}

/// Check a proposal against the runnable set, current facts, and held inputs.
///
/// Pure and deterministic. Checks run in a fixed order and short-circuit at
/// the first failure: unknown task, missing inputs, already satisfied,
/// disallowed tool.
pub fn validate(
    plan: &Plan,
    runnable: &[TaskSpec],
    facts: &FactSet,
    available_inputs: &BTreeSet<Fact>,
) -> Result<ValidatedPlan, ValidationError> {
    let task = runnable
        .iter()
        .find(|t| t.name == plan.task_name)
        .ok_or_else(|| ValidationError::UnknownTask(plan.task_name.clone()))?;

    let missing: BTreeSet<Fact> = task
        .required_inputs
        .difference(available_inputs)
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingInputs {
            task: task.name.clone(),
            missing,
        });
    }

    if task.postconditions_satisfied(facts) {
        return Err(ValidationError::AlreadySatisfied(task.name.clone()));
    }

    for step in &plan.tool_plan {
        if !task.allowed_tools.contains(&step.tool_name) {
            return Err(ValidationError::DisallowedTool {
                task: task.name.clone(),
                tool: step.tool_name.clone(),
            });
        }
    }

    Ok(ValidatedPlan {
        task: task.clone(),
        tool_steps: plan.tool_plan.clone(),
    })
}
