//! Test-only helpers: builders and scripted fakes for the engine seams.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Result;
use serde_json::Value;

use crate::core::planner::{Planner, ProposeError, ProposeRequest};
use crate::core::types::{Context, FactSet, Plan, TaskSpec, ToolStep};
use crate::io::catalog::Catalog;
use crate::io::tools::{Tool, ToolOutput};

/// Build a fact set from string literals.
pub fn fact_set(names: &[&str]) -> FactSet {
    names.iter().map(|name| name.to_string()).collect()
}

/// Build a fully-populated task with default priority.
pub fn task(
    name: &str,
    preconditions: &[&str],
    postconditions: &[&str],
    inputs: &[&str],
    tools: &[&str],
) -> TaskSpec {
    TaskSpec {
        name: name.to_string(),
        priority: 1000,
        preconditions: fact_set(preconditions),
        postconditions: fact_set(postconditions),
        required_inputs: fact_set(inputs),
        allowed_tools: tools.iter().map(|tool| tool.to_string()).collect(),
    }
}

/// Build a plan invoking the given tools in order with empty arguments.
pub fn plan(task_name: &str, tools: &[&str]) -> Plan {
    Plan {
        task_name: task_name.to_string(),
        tool_plan: tools
            .iter()
            .map(|tool| ToolStep {
                tool_name: tool.to_string(),
                tool_args: ToolOutput::new(),
            })
            .collect(),
        rationale: String::new(),
    }
}

/// Build a plan with explicit JSON-object arguments per step.
pub fn plan_with_args(task_name: &str, steps: &[(&str, Value)]) -> Plan {
    Plan {
        task_name: task_name.to_string(),
        tool_plan: steps
            .iter()
            .map(|(tool, args)| ToolStep {
                tool_name: tool.to_string(),
                tool_args: args
                    .as_object()
                    .expect("step args must be a json object")
                    .clone(),
            })
            .collect(),
        rationale: String::new(),
    }
}

/// Build a tool output mapping from key/value pairs.
pub fn tool_output(entries: &[(&str, Value)]) -> ToolOutput {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// In-memory catalog over a fixed task list.
pub struct StaticCatalog {
    tasks: Vec<TaskSpec>,
}

impl StaticCatalog {
    pub fn new(tasks: Vec<TaskSpec>) -> Self {
        Self { tasks }
    }
}

impl Catalog for StaticCatalog {
    fn runnable_tasks(&self, facts: &FactSet) -> Result<Vec<TaskSpec>> {
        Ok(self
            .tasks
            .iter()
            .filter(|task| task.is_runnable(facts))
            .cloned()
            .collect())
    }
}

enum Script {
    /// Predetermined responses, consumed in order. Panics when exhausted.
    Queue(RefCell<VecDeque<Result<Option<Plan>, ProposeError>>>),
    /// The same plan forever.
    Repeat(Plan),
}

/// Planner returning scripted responses without any backend.
pub struct ScriptedPlanner {
    script: Script,
}

impl ScriptedPlanner {
    pub fn new(responses: Vec<Result<Option<Plan>, ProposeError>>) -> Self {
        Self {
            script: Script::Queue(RefCell::new(responses.into())),
        }
    }

    pub fn repeating(plan: Plan) -> Self {
        Self {
            script: Script::Repeat(plan),
        }
    }
}

impl Planner for ScriptedPlanner {
    fn propose(&self, _request: &ProposeRequest<'_>) -> Result<Option<Plan>, ProposeError> {
        match &self.script {
            Script::Queue(queue) => queue
                .borrow_mut()
                .pop_front()
                .expect("scripted planner consulted more often than scripted"),
            Script::Repeat(plan) => Ok(Some(plan.clone())),
        }
    }
}

/// Tool that records every invocation's arguments.
///
/// Each call returns `{"call": n}` so tests can tell invocations apart.
pub struct RecordingTool {
    name: String,
    calls: Rc<RefCell<Vec<ToolOutput>>>,
}

impl RecordingTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared handle to the recorded argument list.
    pub fn calls(&self) -> Rc<RefCell<Vec<ToolOutput>>> {
        Rc::clone(&self.calls)
    }
}

impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _context: &mut Context, args: &ToolOutput) -> Result<ToolOutput> {
        let mut calls = self.calls.borrow_mut();
        calls.push(args.clone());
        Ok(tool_output(&[("call", Value::from(calls.len()))]))
    }
}
