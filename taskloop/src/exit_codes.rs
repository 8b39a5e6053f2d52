//! Stable exit codes for taskloop CLI commands.

/// Command succeeded; for `run`, the loop reached a terminal condition.
pub const OK: i32 = 0;
/// Command failed due to invalid catalog/settings or other errors.
pub const INVALID: i32 = 1;
/// No runnable task (empty query result or exhausted candidates).
pub const NO_RUNNABLE: i32 = 2;
/// `taskloop run` stopped on a fatal validation/execution/planner error.
pub const FAILED: i32 = 3;
