//! Orchestration loop: Planning → Validating → Executing → Updating.
//!
//! The loop is the only component holding state across iterations (fact set,
//! context, step counter). Everything it consumes is re-queried fresh each
//! iteration; every proposal passes the validator before any side effect.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::planner::{Planner, ProposeError, ProposeRequest};
use crate::core::types::{Context, Fact, FactSet};
use crate::core::validator::{ValidationError, validate};
use crate::executor::{ExecutionError, execute};
use crate::io::catalog::Catalog;
use crate::io::tools::ToolRegistry;

/// Policy for runnable tasks whose non-empty postcondition set is already
/// fully achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SatisfiedPolicy {
    /// Proposing such a task is a fatal validation failure.
    Fail,
    /// Such tasks are filtered out before the planner sees the runnable set.
    Skip,
}

/// Loop-level configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard bound on executed steps; reaching it is a normal stop.
    pub max_steps: u32,
    /// Reaching any of these facts terminates the run.
    pub terminal_facts: BTreeSet<Fact>,
    /// Number of context entries exposed to the planner.
    pub snapshot_keys: usize,
    pub on_satisfied: SatisfiedPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 32,
            terminal_facts: BTreeSet::new(),
            snapshot_keys: 20,
            on_satisfied: SatisfiedPolicy::Fail,
        }
    }
}

/// Caller-supplied initial state for a run.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    /// Facts already achieved before the first iteration.
    pub facts: FactSet,
    /// Inputs the caller holds. Distinct namespace from achieved facts.
    pub available_inputs: BTreeSet<Fact>,
    /// Seed context visible to tools and (bounded) to planners.
    pub context: Context,
}

/// Why the loop stopped normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The catalog returned no runnable task, or the planner exhausted its
    /// eligible candidates.
    NoRunnableTasks,
    /// A configured terminal fact was achieved.
    TerminalFactReached { fact: Fact },
    /// The configured step bound was reached.
    MaxStepsReached { steps: u32 },
}

/// Final state of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub facts: FactSet,
    pub steps_executed: u32,
    pub stop: StopReason,
}

/// Per-iteration summary passed to the `on_step` observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Step number (1-indexed).
    pub step: u32,
    /// Name of the executed task.
    pub task: String,
    /// Tool names that produced outputs this step, sorted.
    pub tool_outputs: Vec<String>,
    /// The task's declared postcondition set merged into the fact set.
    pub new_facts: BTreeSet<Fact>,
}

/// Fatal run failure. The loop stops at the first error; nothing retries.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("catalog query failed: {0:#}")]
    Catalog(anyhow::Error),
    #[error(transparent)]
    Propose(#[from] ProposeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Drive the loop until a terminal condition, exhaustion, or failure.
///
/// `on_step` observes each completed iteration after its fact-set update.
/// On failure the run's partial progress is dropped with the returned error;
/// side effects already applied by tools are not rolled back.
pub fn run<C, P, F>(
    catalog: &C,
    planner: &P,
    registry: &ToolRegistry,
    config: &EngineConfig,
    inputs: RunInputs,
    mut on_step: F,
) -> Result<RunOutcome, EngineError>
where
    C: Catalog,
    P: Planner + ?Sized,
    F: FnMut(&StepReport),
{
    let RunInputs {
        mut facts,
        available_inputs,
        mut context,
    } = inputs;
    let mut steps_executed = 0u32;

    loop {
        // Planning: the catalog may have been mutated externally, so the
        // runnable set is recomputed from scratch every iteration.
        let mut runnable = catalog
            .runnable_tasks(&facts)
            .map_err(EngineError::Catalog)?;
        if config.on_satisfied == SatisfiedPolicy::Skip {
            runnable.retain(|task| !task.postconditions_satisfied(&facts));
        }
        if runnable.is_empty() {
            info!(steps_executed, "no runnable tasks, stopping");
            return Ok(RunOutcome {
                facts,
                steps_executed,
                stop: StopReason::NoRunnableTasks,
            });
        }
        debug!(candidates = runnable.len(), "queried runnable tasks");

        let request = ProposeRequest {
            runnable: &runnable,
            facts: &facts,
            available_inputs: &available_inputs,
            context_snapshot: context.snapshot(config.snapshot_keys),
        };
        let Some(plan) = planner.propose(&request)? else {
            info!(steps_executed, "planner exhausted its candidates, stopping");
            return Ok(RunOutcome {
                facts,
                steps_executed,
                stop: StopReason::NoRunnableTasks,
            });
        };

        // Validating: the proposal is untrusted regardless of the planner.
        let validated = validate(&plan, &runnable, &facts, &available_inputs)?;

        // Executing.
        let outcome = execute(&validated, registry, &mut context)?;

        // Updating: the full declared postcondition set is merged, not only
        // the previously-unmet subset.
        facts.extend(outcome.new_facts.iter().cloned());
        steps_executed += 1;
        info!(
            step = steps_executed,
            task = %validated.task.name,
            new_facts = ?outcome.new_facts,
            "step completed"
        );

        on_step(&StepReport {
            step: steps_executed,
            task: validated.task.name.clone(),
            tool_outputs: outcome.outputs.keys().cloned().collect(),
            new_facts: outcome.new_facts,
        });

        if let Some(fact) = config.terminal_facts.intersection(&facts).next().cloned() {
            info!(fact = %fact, "terminal fact reached");
            return Ok(RunOutcome {
                facts,
                steps_executed,
                stop: StopReason::TerminalFactReached { fact },
            });
        }
        if steps_executed >= config.max_steps {
            info!(steps_executed, "step bound reached");
            return Ok(RunOutcome {
                facts,
                steps_executed,
                stop: StopReason::MaxStepsReached {
                    steps: steps_executed,
                },
            });
        }
    }
}
