//! State-driven task-orchestration engine.
//!
//! Tasks are declared by preconditions, postconditions, required inputs and
//! permitted tools. Each iteration queries the catalog for runnable tasks,
//! asks a planner for the next task and an ordered tool plan, independently
//! validates the proposal, executes it, and merges the task's postconditions
//! into a monotonically growing fact set. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, validation,
//!   selection policy). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (catalog documents, the subprocess
//!   oracle, tool registry, configuration). Isolated to enable mocking.
//!
//! Orchestration modules ([`engine`], [`executor`]) coordinate core logic
//! with I/O; the validator is the sole authority on whether an untrusted
//! proposal may execute.

pub mod core;
pub mod engine;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
