//! Catalog adapter: materializes runnable task declarations.
//!
//! The engine re-queries the catalog every iteration and assumes nothing
//! about stability across queries. Records are parsed into typed [`TaskSpec`]s
//! at this boundary; malformed documents are rejected here, never propagated
//! into the validator.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;

use crate::core::invariants::validate_snapshot;
use crate::core::types::{FactSet, TaskSpec};

const CATALOG_SCHEMA: &str = include_str!("../../schemas/catalog.schema.json");

/// Source of runnable task declarations.
pub trait Catalog {
    /// All tasks whose preconditions are satisfied by `facts`, fully
    /// populated. An empty result is a normal stop signal, not an error.
    fn runnable_tasks(&self, facts: &FactSet) -> Result<Vec<TaskSpec>>;
}

/// Catalog backed by a JSON document of task records.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    tasks: Vec<TaskSpec>,
}

impl JsonCatalog {
    /// Load and validate a catalog document (schema + snapshot invariants).
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read catalog {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("load catalog {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents).context("parse catalog json")?;
        validate_catalog_schema(&value)?;
        let tasks: Vec<TaskSpec> =
            serde_json::from_value(value).context("deserialize task records")?;
        let errors = validate_snapshot(&tasks);
        if !errors.is_empty() {
            return Err(anyhow!("catalog invariants failed: {}", errors.join("; ")));
        }
        Ok(Self { tasks })
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Every tool name any task declares, deduplicated and sorted.
    pub fn declared_tools(&self) -> Vec<String> {
        let mut tools: Vec<String> = self
            .tasks
            .iter()
            .flat_map(|task| task.allowed_tools.iter().cloned())
            .collect();
        tools.sort();
        tools.dedup();
        tools
    }
}

impl Catalog for JsonCatalog {
    fn runnable_tasks(&self, facts: &FactSet) -> Result<Vec<TaskSpec>> {
        Ok(self
            .tasks
            .iter()
            .filter(|task| task.is_runnable(facts))
            .cloned()
            .collect())
    }
}

fn validate_catalog_schema(document: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(CATALOG_SCHEMA).context("parse bundled schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(document) {
        let messages = compiled
            .iter_errors(document)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "catalog schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fact_set;

    const SAMPLE: &str = r#"[
        {
            "name": "AssessRisk",
            "priority": 1,
            "preconditions": ["PortfolioCurrent"],
            "postconditions": ["RiskScored"],
            "inputs": ["HoldingsData"],
            "tools": ["var_calculator"]
        },
        {
            "name": "Rebalance",
            "preconditions": ["RiskScored"],
            "postconditions": ["WeightsOptimized"],
            "inputs": [],
            "tools": ["optimizer"]
        }
    ]"#;

    #[test]
    fn loads_and_filters_runnable_tasks() {
        let catalog = JsonCatalog::from_json(SAMPLE).expect("load");
        assert_eq!(catalog.tasks().len(), 2);

        let runnable = catalog
            .runnable_tasks(&fact_set(&["PortfolioCurrent"]))
            .expect("query");
        assert_eq!(runnable.len(), 1);
        assert_eq!(runnable[0].name, "AssessRisk");
        assert_eq!(runnable[0].priority, 1);
    }

    #[test]
    fn empty_runnable_set_is_not_an_error() {
        let catalog = JsonCatalog::from_json(SAMPLE).expect("load");
        let runnable = catalog.runnable_tasks(&fact_set(&[])).expect("query");
        assert!(runnable.is_empty());
    }

    #[test]
    fn declared_tools_are_deduplicated_and_sorted() {
        let catalog = JsonCatalog::from_json(SAMPLE).expect("load");
        assert_eq!(
            catalog.declared_tools(),
            vec!["optimizer".to_string(), "var_calculator".to_string()]
        );
    }

    #[test]
    fn rejects_record_missing_name() {
        let err = JsonCatalog::from_json(r#"[{"priority": 1}]"#).expect_err("schema failure");
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn rejects_unknown_record_fields() {
        let err = JsonCatalog::from_json(r#"[{"name": "t", "prereqs": []}]"#)
            .expect_err("schema failure");
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn rejects_duplicate_task_names() {
        let doc = r#"[{"name": "t"}, {"name": "t"}]"#;
        let err = JsonCatalog::from_json(doc).expect_err("invariant failure");
        assert!(err.to_string().contains("duplicate task name"));
    }

    #[test]
    fn from_path_reads_document_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("catalog.json");
        fs::write(&path, SAMPLE).expect("write");

        let catalog = JsonCatalog::from_path(&path).expect("load");
        assert_eq!(catalog.tasks().len(), 2);
    }
}
