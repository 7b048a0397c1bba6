//! CLI command handlers.
//!
//! This module contains the execution logic for each CLI command.
//! Extracted to enable comprehensive testing of command behavior.

use std::path::Path;
use std::process::ExitCode;

use tracing::info;

use crate::config::ExperimentConfig;
use crate::error::SimResult;
use crate::replication::{explore, ExplorationReport, ReplicationController, ReplicationReport};
use crate::simulation::{QueueModel, WorkStealingDispatcher};

use super::output::{
    print_exploration_report, print_help, print_replication_report, print_version, render_json,
};
use super::{Args, Command};

/// Exit status when the budget ran out with metrics unsolved.
const EXIT_BUDGET_EXHAUSTED: u8 = 2;

/// Main CLI entry point.
///
/// Dispatches to the appropriate command handler based on parsed arguments.
#[must_use]
pub fn run_cli(args: Args) -> ExitCode {
    match args.command {
        Command::Run {
            experiment_path,
            seed_override,
            json,
            verbose,
        } => run_experiment(&experiment_path, seed_override, json, verbose),
        Command::Explore {
            experiment_path,
            replications,
            seed_override,
            json,
        } => explore_experiment(&experiment_path, replications, seed_override, json),
        Command::Help => {
            print_help();
            ExitCode::SUCCESS
        }
        Command::Version => {
            print_version();
            ExitCode::SUCCESS
        }
    }
}

/// Load an experiment and apply a seed override.
///
/// # Errors
///
/// Returns any load or validation error.
pub fn load_experiment(path: &Path, seed_override: Option<u64>) -> SimResult<ExperimentConfig> {
    let mut config = ExperimentConfig::load(path)?;
    if let Some(seed) = seed_override {
        config.set_seed(seed);
    }
    info!(path = %path.display(), seed = config.reproducibility.seed, "loaded experiment");
    Ok(config)
}

/// Run the adaptive controller against the configured queueing model.
///
/// # Errors
///
/// Returns configuration and simulation errors.
pub fn execute_run(config: &ExperimentConfig) -> SimResult<ReplicationReport> {
    ReplicationController::new(config.replication_settings())?
        .select(&QueueModel, &config.queue_params())
}

/// Run a fixed block and estimate every tracked metric.
///
/// # Errors
///
/// Returns configuration and simulation errors.
pub fn execute_explore(
    config: &ExperimentConfig,
    replications: Option<usize>,
) -> SimResult<ExplorationReport> {
    let settings = config.replication_settings();
    explore(
        &QueueModel,
        &config.queue_params(),
        &settings.metrics,
        replications.unwrap_or(config.exploration.replications),
        &WorkStealingDispatcher::with_workers(settings.workers),
        &config.batch_estimator(),
    )
}

/// Run the `run` command.
#[must_use]
pub fn run_experiment(
    path: &Path,
    seed_override: Option<u64>,
    json: bool,
    verbose: bool,
) -> ExitCode {
    let result = load_experiment(path, seed_override)
        .and_then(|config| execute_run(&config).map(|report| (config, report)));

    let (config, report) = match result {
        Ok(ok) => ok,
        Err(e) => {
            eprintln!("✗ Error: {e}");
            return ExitCode::from(1);
        }
    };

    if json {
        match render_json(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("✗ Error: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        print_replication_report(&config, &report, verbose);
    }

    if report.is_solved() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_BUDGET_EXHAUSTED)
    }
}

/// Run the `explore` command.
#[must_use]
pub fn explore_experiment(
    path: &Path,
    replications: Option<usize>,
    seed_override: Option<u64>,
    json: bool,
) -> ExitCode {
    let result = load_experiment(path, seed_override)
        .and_then(|config| execute_explore(&config, replications).map(|report| (config, report)));

    let (config, report) = match result {
        Ok(ok) => ok,
        Err(e) => {
            eprintln!("✗ Error: {e}");
            return ExitCode::from(1);
        }
    };

    if json {
        match render_json(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("✗ Error: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        print_exploration_report(&config, &report);
    }
    ExitCode::SUCCESS
}
