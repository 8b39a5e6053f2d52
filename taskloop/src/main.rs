//! Task-orchestration CLI.
//!
//! Loads a task catalog document, selects or validates work against a fact
//! set, and drives the orchestration loop with either the configured external
//! oracle or the deterministic priority planner.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use taskloop::core::planner::{Planner, PriorityPlanner, choose_next};
use taskloop::core::types::Context;
use taskloop::engine::{self, EngineError, RunInputs, StopReason};
use taskloop::exit_codes;
use taskloop::io::catalog::{Catalog, JsonCatalog};
use taskloop::io::config::{PlannerKind, load_settings};
use taskloop::io::oracle::CommandOracle;
use taskloop::io::tools::ToolRegistry;
use taskloop::logging;

#[derive(Parser)]
#[command(
    name = "taskloop",
    version,
    about = "State-driven task-orchestration engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a catalog document against its schema and invariants.
    Validate {
        /// Path to the catalog JSON document.
        #[arg(long)]
        catalog: PathBuf,
    },
    /// Print the tasks runnable against the given facts.
    Runnable {
        #[arg(long)]
        catalog: PathBuf,
        /// Achieved fact; repeatable.
        #[arg(long = "fact")]
        facts: Vec<String>,
    },
    /// Print the priority-policy candidate for the given facts and inputs.
    Choose {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long = "fact")]
        facts: Vec<String>,
        /// Held input; repeatable.
        #[arg(long = "input")]
        inputs: Vec<String>,
    },
    /// Drive the orchestration loop to termination or failure.
    Run {
        #[arg(long)]
        catalog: PathBuf,
        /// Path to the settings TOML (defaults apply when missing).
        #[arg(long, default_value = "taskloop.toml")]
        config: PathBuf,
        #[arg(long = "fact")]
        facts: Vec<String>,
        #[arg(long = "input")]
        inputs: Vec<String>,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Validate { catalog } => cmd_validate(&catalog),
        Command::Runnable { catalog, facts } => cmd_runnable(&catalog, facts),
        Command::Choose {
            catalog,
            facts,
            inputs,
        } => cmd_choose(&catalog, facts, inputs),
        Command::Run {
            catalog,
            config,
            facts,
            inputs,
        } => cmd_run(&catalog, &config, facts, inputs),
    }
}

fn cmd_validate(catalog_path: &Path) -> Result<i32> {
    let catalog = JsonCatalog::from_path(catalog_path)?;
    println!("ok: {} task(s)", catalog.tasks().len());
    Ok(exit_codes::OK)
}

fn cmd_runnable(catalog_path: &Path, facts: Vec<String>) -> Result<i32> {
    let catalog = JsonCatalog::from_path(catalog_path)?;
    let facts = facts.into_iter().collect();
    let runnable = catalog.runnable_tasks(&facts)?;
    if runnable.is_empty() {
        return Ok(exit_codes::NO_RUNNABLE);
    }
    for task in &runnable {
        println!("{}", task.name);
    }
    Ok(exit_codes::OK)
}

fn cmd_choose(catalog_path: &Path, facts: Vec<String>, inputs: Vec<String>) -> Result<i32> {
    let catalog = JsonCatalog::from_path(catalog_path)?;
    let facts = facts.into_iter().collect();
    let inputs = inputs.into_iter().collect();
    let runnable = catalog.runnable_tasks(&facts)?;
    match choose_next(&runnable, &facts, &inputs) {
        Some(task) => {
            println!("{}", task.name);
            Ok(exit_codes::OK)
        }
        None => Ok(exit_codes::NO_RUNNABLE),
    }
}

fn cmd_run(
    catalog_path: &Path,
    config_path: &Path,
    facts: Vec<String>,
    inputs: Vec<String>,
) -> Result<i32> {
    let settings = load_settings(config_path)?;
    settings.validate().context("invalid settings")?;
    let catalog = JsonCatalog::from_path(catalog_path)?;

    // Real tool backends live outside this binary; runs here use logging
    // stubs for every tool the catalog declares.
    let registry = ToolRegistry::with_stubs(catalog.declared_tools());

    let planner: Box<dyn Planner> = match settings.planner {
        PlannerKind::Oracle => Box::new(
            CommandOracle::new(settings.oracle.command.clone())
                .with_timeout(Duration::from_secs(settings.oracle.timeout_secs))
                .with_output_limit(settings.oracle.output_limit_bytes),
        ),
        PlannerKind::Priority => Box::new(PriorityPlanner),
    };

    let run_inputs = RunInputs {
        facts: facts.into_iter().collect(),
        available_inputs: inputs.into_iter().collect(),
        context: Context::new(),
    };

    let outcome = engine::run(
        &catalog,
        planner.as_ref(),
        &registry,
        &settings.engine_config(),
        run_inputs,
        |report| {
            eprintln!(
                "step {}: {} -> [{}]",
                report.step,
                report.task,
                report
                    .new_facts
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        },
    );

    match outcome {
        Ok(outcome) => {
            let stop = match &outcome.stop {
                StopReason::NoRunnableTasks => json!({"reason": "no_runnable_tasks"}),
                StopReason::TerminalFactReached { fact } => {
                    json!({"reason": "terminal_fact", "fact": fact})
                }
                StopReason::MaxStepsReached { steps } => {
                    json!({"reason": "max_steps", "steps": steps})
                }
            };
            let summary = json!({
                "facts": outcome.facts.iter().collect::<Vec<_>>(),
                "steps_executed": outcome.steps_executed,
                "stop": stop,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if outcome.stop == StopReason::NoRunnableTasks && outcome.steps_executed == 0 {
                return Ok(exit_codes::NO_RUNNABLE);
            }
            Ok(exit_codes::OK)
        }
        Err(err @ EngineError::Catalog(_)) => Err(err.into()),
        Err(err) => {
            eprintln!("run failed: {err}");
            Ok(exit_codes::FAILED)
        }
    }
}
