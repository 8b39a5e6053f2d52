//! Subprocess-backed proposal oracle.
//!
//! [`CommandOracle`] decouples the engine from the actual proposal backend
//! (an LLM CLI, a remote service wrapper, anything that speaks the contract).
//! The request payload goes to the child on stdin; the child must print a
//! strict-JSON plan on stdout. Tests use scripted planners instead of
//! spawning processes.

use std::process::Command;
use std::time::Duration;

use jsonschema::validator_for;
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::planner::{Planner, ProposeError, ProposeRequest};
use crate::core::types::{Plan, TaskSpec};
use crate::io::process::run_with_deadline;

const PROPOSE_TEMPLATE: &str = include_str!("prompts/propose.md");
const PLAN_SCHEMA: &str = include_str!("../../schemas/plan.schema.json");

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 100_000;

/// Compressed task record included in the request payload.
#[derive(Debug, Clone, Serialize)]
struct TaskSummary {
    name: String,
    priority: i64,
    pre: Vec<String>,
    post: Vec<String>,
    inputs: Vec<String>,
    tools: Vec<String>,
}

impl TaskSummary {
    fn from_spec(task: &TaskSpec) -> Self {
        Self {
            name: task.name.clone(),
            priority: task.priority,
            pre: task.preconditions.iter().cloned().collect(),
            post: task.postconditions.iter().cloned().collect(),
            inputs: task.required_inputs.iter().cloned().collect(),
            tools: task.allowed_tools.iter().cloned().collect(),
        }
    }
}

/// Serialize the full request payload the oracle sees.
fn build_payload(request: &ProposeRequest<'_>) -> Value {
    let summaries: Vec<TaskSummary> = request.runnable.iter().map(TaskSummary::from_spec).collect();
    serde_json::json!({
        "runnable_tasks": summaries,
        "current_state": request.facts.iter().collect::<Vec<_>>(),
        "available_inputs": request.available_inputs.iter().collect::<Vec<_>>(),
        "context_snapshot": request.context_snapshot,
    })
}

/// Parse and schema-check an oracle response.
///
/// Anything that is not a single strict-JSON object matching the plan schema
/// is a fatal parse failure; there is no repair or retry here.
fn parse_plan(stdout: &str) -> Result<Plan, ProposeError> {
    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|err| ProposeError::Parse(format!("invalid json: {err}")))?;

    let schema: Value =
        serde_json::from_str(PLAN_SCHEMA).expect("bundled plan schema should be valid json");
    let compiled = validator_for(&schema).expect("bundled plan schema should compile");
    if !compiled.is_valid(&value) {
        let messages = compiled
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(ProposeError::Parse(messages.join("; ")));
    }

    serde_json::from_value(value).map_err(|err| ProposeError::Parse(err.to_string()))
}

/// Oracle that spawns a configured command per proposal.
pub struct CommandOracle {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandOracle {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: DEFAULT_ORACLE_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit_bytes = limit;
        self
    }

    fn render_prompt(&self, payload: &Value) -> Result<String, ProposeError> {
        let mut env = Environment::new();
        env.add_template("propose", PROPOSE_TEMPLATE)
            .expect("propose template should be valid");
        let template = env.get_template("propose").expect("template registered");
        let rendered = serde_json::to_string_pretty(payload)
            .map_err(|err| ProposeError::Backend(format!("serialize payload: {err}")))
            .and_then(|payload| {
                template
                    .render(context! { payload => payload })
                    .map_err(|err| ProposeError::Backend(format!("render prompt: {err}")))
            })?;
        Ok(rendered)
    }
}

impl Planner for CommandOracle {
    #[instrument(skip_all, fields(runnable = request.runnable.len()))]
    fn propose(&self, request: &ProposeRequest<'_>) -> Result<Option<Plan>, ProposeError> {
        let payload = build_payload(request);
        let prompt = self.render_prompt(&payload)?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ProposeError::Backend("empty oracle command".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        info!(command = %program, "requesting proposal");
        let output = run_with_deadline(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| ProposeError::Backend(format!("{err:#}")))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "oracle timed out");
            return Err(ProposeError::Timeout(self.timeout));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code = ?output.status.code(), "oracle command failed");
            return Err(ProposeError::Backend(format!(
                "oracle exited with status {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let plan = parse_plan(&stdout)?;
        debug!(task = %plan.task_name, steps = plan.tool_plan.len(), "proposal parsed");
        Ok(Some(plan))
    }
}
