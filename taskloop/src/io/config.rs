//! Engine configuration loaded from a TOML file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, SatisfiedPolicy};

/// Which planner drives task selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerKind {
    /// External proposal command (untrusted; validated every iteration).
    Oracle,
    /// Deterministic in-process priority policy.
    Priority,
}

/// Engine settings (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Hard bound on executed steps per run.
    pub max_steps: u32,

    /// Reaching any of these facts terminates the run.
    pub terminal_facts: Vec<String>,

    /// Number of context entries included in planner payloads.
    pub snapshot_keys: usize,

    /// What to do with runnable tasks whose postconditions are all met:
    /// `fail` rejects such a proposal, `skip` hides them from the planner.
    pub on_satisfied: SatisfiedPolicy,

    pub planner: PlannerKind,

    pub oracle: OracleSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleSettings {
    /// Command to spawn per proposal (e.g. `["llm-plan","--json"]`).
    pub command: Vec<String>,

    /// Deadline for one proposal in seconds.
    pub timeout_secs: u64,

    /// Truncate oracle stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_steps: 32,
            terminal_facts: Vec::new(),
            snapshot_keys: 20,
            on_satisfied: SatisfiedPolicy::Fail,
            planner: PlannerKind::Oracle,
            oracle: OracleSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.snapshot_keys == 0 {
            return Err(anyhow!("snapshot_keys must be > 0"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.output_limit_bytes == 0 {
            return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
        }
        if self.planner == PlannerKind::Oracle
            && (self.oracle.command.is_empty() || self.oracle.command[0].trim().is_empty())
        {
            return Err(anyhow!(
                "oracle.command must be a non-empty array when planner = \"oracle\""
            ));
        }
        Ok(())
    }

    /// Engine-facing view of these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_steps: self.max_steps,
            terminal_facts: self.terminal_facts.iter().cloned().collect(),
            snapshot_keys: self.snapshot_keys,
            on_satisfied: self.on_satisfied,
        }
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`. Note the default
/// planner is `oracle` with no command, which fails validation; a missing
/// file is only usable with `planner = "priority"` overridden by the caller.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(settings)
}

/// Atomically write settings to disk (temp file + rename).
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    let mut buf = toml::to_string_pretty(settings).context("serialize settings toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("settings path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp settings {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace settings {}", path.display()))?;
    Ok(())
}
