//! In-order execution of a validated tool plan.

use std::collections::{BTreeMap, BTreeSet};

use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::types::{Context, Fact};
use crate::core::validator::ValidatedPlan;
use crate::io::tools::{ToolOutput, ToolRegistry};

/// Why plan execution aborted. All variants are fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// A step named a tool absent from the registry.
    #[error("tool '{0}' is not registered")]
    UnregisteredTool(String),
    /// A step's arguments violated the tool's declared schema.
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArgs { tool: String, reason: String },
    /// The tool itself failed.
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },
}

/// Result of executing a whole plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    /// Per-tool outputs, keyed by tool name. A tool invoked twice keeps only
    /// its last output.
    pub outputs: BTreeMap<String, ToolOutput>,
    /// The task's full declared postcondition set, achieved by completion.
    pub new_facts: BTreeSet<Fact>,
}

/// Run every step of a validated plan, in plan order, against the registry.
///
/// Each output is stored in the context under the tool's name (last write
/// wins). A failing step aborts the remainder; context writes from earlier
/// steps are NOT rolled back, and no postconditions are reported.
pub fn execute(
    plan: &ValidatedPlan,
    registry: &ToolRegistry,
    context: &mut Context,
) -> Result<ExecOutcome, ExecutionError> {
    let mut outputs: BTreeMap<String, ToolOutput> = BTreeMap::new();

    for step in &plan.tool_steps {
        let tool = registry
            .get(&step.tool_name)
            .ok_or_else(|| ExecutionError::UnregisteredTool(step.tool_name.clone()))?;

        if let Some(schema) = tool.args_schema() {
            check_args(&step.tool_name, &schema, &step.tool_args)?;
        }

        debug!(task = %plan.task.name, tool = %step.tool_name, "invoking tool");
        let output =
            tool.invoke(context, &step.tool_args)
                .map_err(|err| ExecutionError::ToolFailed {
                    tool: step.tool_name.clone(),
                    message: format!("{err:#}"),
                })?;

        context.insert(step.tool_name.clone(), Value::Object(output.clone()));
        outputs.insert(step.tool_name.clone(), output);
    }

    info!(
        task = %plan.task.name,
        steps = plan.tool_steps.len(),
        postconditions = plan.task.postconditions.len(),
        "plan executed"
    );
    Ok(ExecOutcome {
        outputs,
        new_facts: plan.task.postconditions.clone(),
    })
}

fn check_args(tool: &str, schema: &Value, args: &ToolOutput) -> Result<(), ExecutionError> {
    let compiled = validator_for(schema).map_err(|err| ExecutionError::InvalidArgs {
        tool: tool.to_string(),
        reason: format!("invalid args schema: {err}"),
    })?;
    let instance = Value::Object(args.clone());
    if !compiled.is_valid(&instance) {
        let messages = compiled
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(ExecutionError::InvalidArgs {
            tool: tool.to_string(),
            reason: messages.join("; "),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validator::ValidatedPlan;
    use crate::io::tools::StubTool;
    use crate::test_support::{RecordingTool, fact_set, plan_with_args, task, tool_output};
    use serde_json::json;

    fn validated(task_name: &str, steps: &crate::core::types::Plan) -> ValidatedPlan {
        ValidatedPlan {
            task: task(task_name, &["A"], &["B", "C"], &[], &["t1", "t2"]),
            tool_steps: steps.tool_plan.clone(),
        }
    }

    #[test]
    fn executes_steps_in_plan_order_and_reports_all_postconditions() {
        let recorder = RecordingTool::new("t2");
        let calls = recorder.calls();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(StubTool::new("t1")));
        registry.register(Box::new(recorder));

        let plan = plan_with_args("X", &[("t2", json!({})), ("t1", json!({}))]);
        let mut context = Context::new();
        let outcome = execute(&validated("X", &plan), &registry, &mut context).expect("execute");

        assert_eq!(outcome.new_facts, fact_set(&["B", "C"]));
        assert_eq!(calls.borrow().len(), 1);
        assert!(outcome.outputs.contains_key("t1"));
        assert!(outcome.outputs.contains_key("t2"));
    }

    #[test]
    fn stores_output_in_context_under_tool_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(
            StubTool::new("t1").with_output(tool_output(&[("risk_score", json!(0.97))])),
        ));

        let plan = plan_with_args("X", &[("t1", json!({}))]);
        let mut context = Context::new();
        execute(&validated("X", &plan), &registry, &mut context).expect("execute");

        assert_eq!(
            context.get("t1"),
            Some(&json!({"risk_score": 0.97}))
        );
    }

    #[test]
    fn repeated_tool_keeps_last_output_only() {
        let recorder = RecordingTool::new("t1");
        let calls = recorder.calls();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(recorder));

        let plan = plan_with_args(
            "X",
            &[("t1", json!({"pass": 1})), ("t1", json!({"pass": 2}))],
        );
        let mut context = Context::new();
        let outcome = execute(&validated("X", &plan), &registry, &mut context).expect("execute");

        // Both invocations ran; one output key survives.
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(
            outcome.outputs["t1"].get("call"),
            Some(&json!(2)),
            "second invocation's output wins"
        );
    }

    #[test]
    fn unregistered_tool_aborts_remaining_steps_without_rollback() {
        let recorder = RecordingTool::new("t1");
        let calls = recorder.calls();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(recorder));

        let plan = plan_with_args(
            "X",
            &[("t1", json!({})), ("ghost", json!({})), ("t1", json!({}))],
        );
        let mut context = Context::new();
        let err = execute(&validated("X", &plan), &registry, &mut context)
            .expect_err("unregistered tool");

        assert_eq!(err, ExecutionError::UnregisteredTool("ghost".to_string()));
        // First step ran and its context write survives; the third never ran.
        assert_eq!(calls.borrow().len(), 1);
        assert!(context.get("t1").is_some());
    }

    #[test]
    fn rejects_args_violating_tool_schema() {
        struct TypedTool;
        impl crate::io::tools::Tool for TypedTool {
            fn name(&self) -> &str {
                "typed"
            }
            fn args_schema(&self) -> Option<Value> {
                Some(json!({
                    "type": "object",
                    "required": ["window"],
                    "properties": {"window": {"type": "integer"}}
                }))
            }
            fn invoke(
                &self,
                _context: &mut Context,
                _args: &ToolOutput,
            ) -> anyhow::Result<ToolOutput> {
                Ok(ToolOutput::new())
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(TypedTool));

        let mut validated_plan = validated(
            "X",
            &plan_with_args("X", &[("typed", json!({"window": "thirty"}))]),
        );
        validated_plan.task.allowed_tools.insert("typed".to_string());

        let mut context = Context::new();
        let err = execute(&validated_plan, &registry, &mut context).expect_err("bad args");
        assert!(matches!(err, ExecutionError::InvalidArgs { tool, .. } if tool == "typed"));
    }

    #[test]
    fn tool_failure_is_fatal_and_typed() {
        struct FailingTool;
        impl crate::io::tools::Tool for FailingTool {
            fn name(&self) -> &str {
                "boom"
            }
            fn invoke(
                &self,
                _context: &mut Context,
                _args: &ToolOutput,
            ) -> anyhow::Result<ToolOutput> {
                Err(anyhow::anyhow!("backend unavailable"))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool));

        let mut validated_plan = validated("X", &plan_with_args("X", &[("boom", json!({}))]));
        validated_plan.task.allowed_tools.insert("boom".to_string());

        let mut context = Context::new();
        let err = execute(&validated_plan, &registry, &mut context).expect_err("tool failure");
        assert!(
            matches!(err, ExecutionError::ToolFailed { tool, message } if tool == "boom" && message.contains("backend unavailable"))
        );
    }

    #[test]
    fn empty_plan_still_yields_postconditions() {
        let registry = ToolRegistry::new();
        let plan = plan_with_args("X", &[]);
        let mut context = Context::new();
        let outcome = execute(&validated("X", &plan), &registry, &mut context).expect("execute");
        assert_eq!(outcome.new_facts, fact_set(&["B", "C"]));
        assert!(outcome.outputs.is_empty());
    }
}
