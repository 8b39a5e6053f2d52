//! Semantic invariants on catalog snapshots not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::types::TaskSpec;

/// Check semantic invariants over a parsed catalog snapshot:
/// - Task names are non-blank and unique
/// - Fact identifiers (pre/post/inputs) are non-blank
/// - Tool names are non-blank
pub fn validate_snapshot(tasks: &[TaskSpec]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for task in tasks {
        if task.name.trim().is_empty() {
            errors.push("task with blank name".to_string());
            continue;
        }
        if !seen.insert(task.name.as_str()) {
            errors.push(format!("duplicate task name '{}'", task.name));
        }

        for (label, facts) in [
            ("precondition", &task.preconditions),
            ("postcondition", &task.postconditions),
            ("input", &task.required_inputs),
        ] {
            for fact in facts {
                if fact.trim().is_empty() {
                    errors.push(format!("{}: blank {} name", task.name, label));
                }
            }
        }

        for tool in &task.allowed_tools {
            if tool.trim().is_empty() {
                errors.push(format!("{}: blank tool name", task.name));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::task;

    #[test]
    fn clean_snapshot_has_no_violations() {
        let tasks = vec![
            task("a", &["P"], &["Q"], &["I"], &["t"]),
            task("b", &[], &[], &[], &[]),
        ];
        assert!(validate_snapshot(&tasks).is_empty());
    }

    #[test]
    fn reports_duplicate_and_blank_names() {
        let tasks = vec![
            task("dup", &[], &[], &[], &[]),
            task("dup", &[], &[], &[], &[]),
            task("  ", &[], &[], &[], &[]),
        ];
        let errors = validate_snapshot(&tasks);
        assert!(errors.iter().any(|e| e.contains("duplicate task name")));
        assert!(errors.iter().any(|e| e.contains("blank name")));
    }

    #[test]
    fn reports_blank_fact_and_tool_entries() {
        let tasks = vec![task("a", &[""], &["Q"], &[], &[" "])];
        let errors = validate_snapshot(&tasks);
        assert!(errors.iter().any(|e| e.contains("blank precondition name")));
        assert!(errors.iter().any(|e| e.contains("blank tool name")));
    }
}
