//! Tool registry: named capabilities a validated plan may invoke.
//!
//! Tools are the only place a plan touches the outside world. Each tool may
//! declare an argument schema; the executor rejects malformed arguments at
//! the boundary instead of letting them reach tool logic.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use crate::core::types::Context;

/// Key/value result mapping produced by a tool invocation.
pub type ToolOutput = serde_json::Map<String, Value>;

/// A named, invocable capability.
pub trait Tool {
    fn name(&self) -> &str;

    /// JSON Schema constraining `tool_args`. `None` disables the check.
    fn args_schema(&self) -> Option<Value> {
        None
    }

    /// Run the tool. May read and write the shared run context.
    fn invoke(&self, context: &mut Context, args: &ToolOutput) -> Result<ToolOutput>;
}

/// Registry mapping tool names to implementations.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. Re-registering replaces.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Registry of no-op stubs for the given names. Each stub logs its
    /// invocation and returns an empty mapping; useful for dry-running a
    /// catalog whose real tools live elsewhere.
    pub fn with_stubs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(Box::new(StubTool::new(name.into())));
        }
        registry
    }
}

/// Tool that records nothing and returns a fixed output mapping.
pub struct StubTool {
    name: String,
    output: ToolOutput,
}

impl StubTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: ToolOutput::new(),
        }
    }

    pub fn with_output(mut self, output: ToolOutput) -> Self {
        self.output = output;
        self
    }
}

impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _context: &mut Context, args: &ToolOutput) -> Result<ToolOutput> {
        let args_value = Value::Object(args.clone());
        info!(tool = %self.name, args = %args_value, "stub tool invoked");
        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_then_get_returns_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(StubTool::new("t1")));
        assert!(registry.get("t1").is_some());
        assert!(registry.get("t2").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let registry = ToolRegistry::with_stubs(["zeta", "alpha"]);
        assert_eq!(registry.names(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn stub_returns_configured_output() {
        let mut output = ToolOutput::new();
        output.insert("risk_score".to_string(), json!(0.97));
        let stub = StubTool::new("var_calculator").with_output(output);

        let mut context = Context::new();
        let result = stub.invoke(&mut context, &ToolOutput::new()).expect("invoke");
        assert_eq!(result.get("risk_score"), Some(&json!(0.97)));
    }
}
